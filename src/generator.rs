// Synthetic data generator - seeds a store with plausible customers plus a
// controlled share of typo'd duplicates, so duplicate detection has known
// ground truth to work against.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::record::{CustomerFields, Field};
use crate::store::{NewRecord, RecordStore, StoreError};

// ============================================================================
// CONFIG
// ============================================================================

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Total records to produce, originals plus duplicates.
    pub num_records: usize,

    /// Share of `num_records` produced as typo'd duplicates of an original.
    pub duplicate_ratio: f64,

    /// Seed for the RNG; the same seed reproduces the same dataset.
    pub seed: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig {
            num_records: 200,
            duplicate_ratio: 0.2,
            seed: 42,
        }
    }
}

/// Counts of what a populate run actually wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratedCounts {
    pub originals: usize,
    pub duplicates: usize,
}

// ============================================================================
// NAME POOLS
// ============================================================================

const FIRST_NAMES: &[&str] = &[
    "James", "Mary", "John", "Patricia", "Robert", "Jennifer", "Michael",
    "Linda", "David", "Elizabeth", "William", "Barbara", "Richard", "Susan",
    "Joseph", "Jessica", "Thomas", "Sarah", "Charles", "Karen", "Daniel",
    "Nancy", "Matthew", "Lisa", "Anthony", "Betty", "Mark", "Margaret",
    "Steven", "Sandra", "Andrew", "Ashley", "Kenneth", "Dorothy", "Paul",
    "Kimberly", "Joshua", "Emily", "Kevin", "Donna",
];

const LAST_NAMES: &[&str] = &[
    "Smith", "Johnson", "Williams", "Brown", "Jones", "Garcia", "Miller",
    "Davis", "Rodriguez", "Martinez", "Hernandez", "Lopez", "Gonzalez",
    "Wilson", "Anderson", "Thomas", "Taylor", "Moore", "Jackson", "Martin",
    "Lee", "Perez", "Thompson", "White", "Harris", "Sanchez", "Clark",
    "Ramirez", "Lewis", "Robinson", "Walker", "Young", "Allen", "King",
];

const EMAIL_DOMAINS: &[&str] = &[
    "gmail.com", "yahoo.com", "hotmail.com", "outlook.com", "icloud.com",
    "example.org",
];

const STREET_NAMES: &[&str] = &[
    "Main St", "Oak Ave", "Maple Dr", "Cedar Ln", "Park Blvd", "Elm St",
    "Washington Ave", "Lake View Rd", "Sunset Dr", "Hillcrest Ct",
];

const CITIES: &[&str] = &[
    "Springfield", "Riverside", "Franklin", "Greenville", "Clinton",
    "Fairview", "Madison", "Georgetown", "Salem", "Arlington",
];

// ============================================================================
// TYPOS
// ============================================================================

/// Keyboard neighbours used for substitution typos, so a corrupted value
/// stays within the edit distance real fat-finger mistakes produce.
fn keyboard_adjacent(c: char) -> &'static str {
    match c {
        'a' => "sq",
        'b' => "vgn",
        'c' => "xvf",
        'd' => "sfre",
        'e' => "wrd",
        'f' => "dgrt",
        'g' => "fhty",
        'h' => "gyuj",
        'i' => "uko",
        'j' => "hnik",
        'k' => "jmlo",
        'l' => "kpo",
        'm' => "njk",
        'n' => "bmhj",
        'o' => "ilp",
        'p' => "ol",
        'q' => "wa",
        'r' => "etd",
        's' => "awedx",
        't' => "rfgy",
        'u' => "yhi",
        'v' => "cfgb",
        'w' => "qase",
        'x' => "zsdc",
        'y' => "tghu",
        'z' => "asx",
        _ => "",
    }
}

/// Corrupt `text` with `num_typos` single-character edits: substitute a
/// keyboard-adjacent character, delete, insert, or transpose. Strings
/// shorter than two characters come back untouched.
pub fn introduce_typo(text: &str, num_typos: usize, rng: &mut StdRng) -> String {
    if text.chars().count() < 2 {
        return text.to_string();
    }

    let mut chars: Vec<char> = text.chars().collect();
    for _ in 0..num_typos {
        if chars.len() < 2 {
            break;
        }
        let idx = rng.gen_range(0..chars.len());
        match rng.gen_range(0..4u8) {
            0 => {
                // substitute
                let lower = chars[idx].to_ascii_lowercase();
                let neighbours = keyboard_adjacent(lower);
                let replacement = if neighbours.is_empty() {
                    (b'a' + rng.gen_range(0..26u8)) as char
                } else {
                    let pool: Vec<char> = neighbours.chars().collect();
                    pool[rng.gen_range(0..pool.len())]
                };
                chars[idx] = replacement;
            }
            1 => {
                // delete
                if chars.len() > 1 {
                    chars.remove(idx);
                }
            }
            2 => {
                // insert
                chars.insert(idx, (b'a' + rng.gen_range(0..26u8)) as char);
            }
            _ => {
                // transpose
                if idx < chars.len() - 1 {
                    chars.swap(idx, idx + 1);
                }
            }
        }
    }
    chars.into_iter().collect()
}

// ============================================================================
// GENERATION
// ============================================================================

fn random_original(rng: &mut StdRng) -> CustomerFields {
    let first = *FIRST_NAMES.choose(rng).unwrap();
    let last = *LAST_NAMES.choose(rng).unwrap();
    let domain = *EMAIL_DOMAINS.choose(rng).unwrap();
    let street = *STREET_NAMES.choose(rng).unwrap();
    let city = *CITIES.choose(rng).unwrap();

    let email = format!(
        "{}.{}{}@{}",
        first.to_lowercase(),
        last.to_lowercase(),
        rng.gen_range(1..1000),
        domain
    );
    let phone = format!(
        "({}) {}-{:04}",
        rng.gen_range(200..1000),
        rng.gen_range(200..1000),
        rng.gen_range(0..10000)
    );
    let address = format!("{} {}, {}", rng.gen_range(1..2000), street, city);

    CustomerFields::new()
        .with_first_name(first)
        .with_last_name(last)
        .with_email(&email)
        .with_phone(&phone)
        .with_address(&address)
}

/// Derive a typo'd duplicate from an original. Names take one or sometimes
/// two typos, the email exactly one (conservative, it is the strongest
/// identifier), the phone one typo 70% of the time.
fn corrupt(base: &CustomerFields, rng: &mut StdRng) -> CustomerFields {
    let intensity = *[1usize, 1, 1, 2].choose(rng).unwrap();
    let mut dup = base.clone();

    for field in [Field::FirstName, Field::LastName] {
        if let Some(value) = base.get(field) {
            let typos = rng.gen_range(1..=intensity);
            dup.set(field, Some(introduce_typo(value, typos, rng)));
        }
    }
    if let Some(email) = base.get(Field::Email) {
        dup.set(Field::Email, Some(introduce_typo(email, 1, rng)));
    }
    if rng.gen_bool(0.7) {
        if let Some(phone) = base.get(Field::Phone) {
            dup.set(Field::Phone, Some(introduce_typo(phone, 1, rng)));
        }
    }
    dup
}

/// Fill a store with synthetic customers per `config`. Originals are written
/// first, then duplicates derived from randomly chosen originals.
pub fn populate<S: RecordStore + ?Sized>(
    store: &S,
    config: &GeneratorConfig,
) -> Result<GeneratedCounts, StoreError> {
    let mut rng = StdRng::seed_from_u64(config.seed);

    let num_duplicates = (config.num_records as f64 * config.duplicate_ratio) as usize;
    let num_originals = config.num_records.saturating_sub(num_duplicates);

    info!(
        originals = num_originals,
        duplicates = num_duplicates,
        seed = config.seed,
        "generating synthetic customers"
    );

    let mut originals = Vec::with_capacity(num_originals);
    for _ in 0..num_originals {
        let fields = random_original(&mut rng);
        store.insert(NewRecord::original(fields.clone(), "data_generator"))?;
        originals.push(fields);
    }

    let mut duplicates = 0;
    if !originals.is_empty() {
        for _ in 0..num_duplicates {
            let base = originals.choose(&mut rng).unwrap();
            let fields = corrupt(base, &mut rng);
            store.insert(NewRecord::duplicate(fields, "data_generator"))?;
            duplicates += 1;
        }
    }

    Ok(GeneratedCounts {
        originals: originals.len(),
        duplicates,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteStore;
    use crate::record::RecordType;
    use crate::scoring::similarity_score;
    use crate::store::RecordFilter;

    fn rng(seed: u64) -> StdRng {
        StdRng::seed_from_u64(seed)
    }

    #[test]
    fn test_typo_changes_longer_strings() {
        let mut r = rng(7);
        let corrupted = introduce_typo("johnathan", 1, &mut r);
        // one edit away at most; never more than one char of drift in length
        let diff = corrupted.len() as i64 - "johnathan".len() as i64;
        assert!(diff.abs() <= 1);
    }

    #[test]
    fn test_typo_leaves_short_strings_alone() {
        let mut r = rng(7);
        assert_eq!(introduce_typo("a", 3, &mut r), "a");
        assert_eq!(introduce_typo("", 1, &mut r), "");
    }

    #[test]
    fn test_same_seed_same_dataset() {
        let a = SqliteStore::open_in_memory().unwrap();
        let b = SqliteStore::open_in_memory().unwrap();
        let config = GeneratorConfig {
            num_records: 30,
            duplicate_ratio: 0.2,
            seed: 99,
        };

        populate(&a, &config).unwrap();
        populate(&b, &config).unwrap();

        let list_a = a.list(RecordFilter::All, 100).unwrap();
        let list_b = b.list(RecordFilter::All, 100).unwrap();
        assert_eq!(list_a.len(), list_b.len());
        for (ra, rb) in list_a.iter().zip(&list_b) {
            assert_eq!(ra.fields, rb.fields);
            assert_eq!(ra.record_type, rb.record_type);
        }
    }

    #[test]
    fn test_populate_counts_and_types() {
        let store = SqliteStore::open_in_memory().unwrap();
        let config = GeneratorConfig {
            num_records: 50,
            duplicate_ratio: 0.2,
            seed: 1,
        };

        let counts = populate(&store, &config).unwrap();
        assert_eq!(counts.originals, 40);
        assert_eq!(counts.duplicates, 10);
        assert_eq!(
            store.count(RecordFilter::ByType(RecordType::Original)).unwrap(),
            40
        );
        assert_eq!(
            store.count(RecordFilter::ByType(RecordType::Duplicate)).unwrap(),
            10
        );
    }

    #[test]
    fn test_duplicates_stay_recognizable() {
        // Corrupted copies must mostly stay detectable against their base
        // record, otherwise the dataset is useless for exercising detection.
        // Individual pairs can score 0 when every field takes an unlucky
        // edit, so this checks the batch, not each pair.
        let mut r = rng(5);
        let mut scoring_pairs = 0;
        for _ in 0..50 {
            let base = random_original(&mut r);
            let dup = corrupt(&base, &mut r);
            if similarity_score(&base, &dup) >= 20 {
                scoring_pairs += 1;
            }
        }
        assert!(
            scoring_pairs >= 25,
            "only {}/50 corrupted copies kept a detectable score",
            scoring_pairs
        );
    }

    #[test]
    fn test_zero_duplicate_ratio() {
        let store = SqliteStore::open_in_memory().unwrap();
        let config = GeneratorConfig {
            num_records: 10,
            duplicate_ratio: 0.0,
            seed: 3,
        };
        let counts = populate(&store, &config).unwrap();
        assert_eq!(counts.duplicates, 0);
        assert_eq!(counts.originals, 10);
    }
}
