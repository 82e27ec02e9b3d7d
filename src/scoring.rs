// Similarity Scorer - weighted 160-point field comparison
//
// Weights reflect how strongly each field identifies a person:
//   first_name  40 exact / 20 partial
//   last_name   40 exact / 20 partial
//   email       60 exact / 30 username match (highest weight)
//   phone       20 on normalized digits
//
// Comparison is case-insensitive and trimmed; absent fields contribute 0.

use crate::record::{CustomerFields, Field};

/// Maximum similarity score when every weighted field matches exactly.
pub const MAX_SIMILARITY_SCORE: u32 = 160;

const NAME_EXACT: u32 = 40;
const NAME_PARTIAL: u32 = 20;
const EMAIL_EXACT: u32 = 60;
const EMAIL_USERNAME: u32 = 30;
const PHONE_EXACT: u32 = 20;

/// Calculate the weighted similarity score between two field sets.
///
/// Deterministic and commutative. Each field term is independently additive;
/// a term contributes 0 whenever either side lacks a value for it.
///
/// ```
/// use consumer_dedup::{similarity_score, CustomerFields};
///
/// let a = CustomerFields::new()
///     .with_first_name("John")
///     .with_last_name("Smith")
///     .with_email("john@gmail.com");
/// let b = CustomerFields::new()
///     .with_first_name("Jon")
///     .with_last_name("Smith")
///     .with_email("john@gmail.com");
///
/// // 20 (partial first) + 40 (exact last) + 60 (exact email)
/// assert_eq!(similarity_score(&a, &b), 120);
/// ```
pub fn similarity_score(a: &CustomerFields, b: &CustomerFields) -> u32 {
    let mut score = 0;

    score += name_score(a.get(Field::FirstName), b.get(Field::FirstName));
    score += name_score(a.get(Field::LastName), b.get(Field::LastName));
    score += email_score(a.get(Field::Email), b.get(Field::Email));
    score += phone_score(a.get(Field::Phone), b.get(Field::Phone));

    score
}

/// Exact name match gets full points; containment either way ("Jon" in
/// "Jonathan") gets half.
fn name_score(a: Option<&str>, b: Option<&str>) -> u32 {
    let (a, b) = match (a, b) {
        (Some(a), Some(b)) => (a.to_lowercase(), b.to_lowercase()),
        _ => return 0,
    };

    if a == b {
        NAME_EXACT
    } else if a.contains(&b) || b.contains(&a) {
        NAME_PARTIAL
    } else {
        0
    }
}

/// Exact equality of the full lowercase email is the strongest single
/// signal this scorer has. Failing that, a matching username with a
/// different domain still earns partial credit. A value without '@' is
/// not an error; it just earns no partial credit.
fn email_score(a: Option<&str>, b: Option<&str>) -> u32 {
    let (a, b) = match (a, b) {
        (Some(a), Some(b)) => (a.to_lowercase(), b.to_lowercase()),
        _ => return 0,
    };

    if a == b {
        return EMAIL_EXACT;
    }

    match (a.split_once('@'), b.split_once('@')) {
        (Some((user_a, _)), Some((user_b, _))) if user_a == user_b => EMAIL_USERNAME,
        _ => 0,
    }
}

/// Phones are compared on digits only, so "(555) 123-4567" and
/// "555-123-4567" match. No partial credit.
fn phone_score(a: Option<&str>, b: Option<&str>) -> u32 {
    let (a, b) = match (a, b) {
        (Some(a), Some(b)) => (normalize_phone(a), normalize_phone(b)),
        _ => return 0,
    };

    if !a.is_empty() && a == b {
        PHONE_EXACT
    } else {
        0
    }
}

/// Strip everything but digits.
pub fn normalize_phone(value: &str) -> String {
    value.chars().filter(char::is_ascii_digit).collect()
}
