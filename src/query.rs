// Candidate Query Builder - turn a partial customer into a fuzzy-search
// request for the record store.
//
// The engine never ranks text itself; it only states, per field, how much
// edit-distance slack to allow and how much the field should weigh in the
// store's own relevance computation.

use serde::{Deserialize, Serialize};

use crate::record::{CustomerFields, Field};

/// One fuzzy-match condition against a single field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchClause {
    pub field: Field,

    /// Text to match, as supplied (the store decides how to normalize).
    pub query: String,

    /// Maximum character edits (insert/delete/substitute) tolerated.
    pub max_edits: u32,

    /// Importance weight passed through to the store's relevance scoring.
    pub boost: u32,
}

/// An ordered set of clauses combined with OR semantics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuzzySearchRequest {
    pub clauses: Vec<SearchClause>,

    /// How many clauses must match for a record to qualify. Always 1 here;
    /// kept explicit because the store contract speaks in these terms.
    pub minimum_should_match: u32,
}

/// Per-field search tuning. Names tolerate two edits (spelling variants),
/// email and phone only one; email carries the highest boost because it is
/// the strongest unique identifier.
fn clause_tuning(field: Field) -> Option<(u32, u32)> {
    match field {
        Field::FirstName => Some((2, 3)),
        Field::LastName => Some((2, 3)),
        Field::Email => Some((1, 5)),
        Field::Phone => Some((1, 2)),
        Field::Address => None,
    }
}

/// Build the fuzzy-search request for a partial customer.
///
/// Emits one clause per non-empty searchable field, in stable field order.
/// Returns `None` when no searchable field is present — callers must
/// short-circuit to an empty candidate list rather than querying.
pub fn build_search_request(fields: &CustomerFields) -> Option<FuzzySearchRequest> {
    let mut clauses = Vec::new();

    for field in Field::SEARCHABLE {
        let value = match fields.get(field) {
            Some(value) => value,
            None => continue,
        };
        let (max_edits, boost) = match clause_tuning(field) {
            Some(tuning) => tuning,
            None => continue,
        };

        clauses.push(SearchClause {
            field,
            query: value.to_string(),
            max_edits,
            boost,
        });
    }

    if clauses.is_empty() {
        return None;
    }

    Some(FuzzySearchRequest {
        clauses,
        minimum_should_match: 1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_request() {
        let fields = CustomerFields::new()
            .with_first_name("John")
            .with_last_name("Smith")
            .with_email("john@x.com")
            .with_phone("(555) 123-4567");

        let request = build_search_request(&fields).expect("request");
        assert_eq!(request.minimum_should_match, 1);
        assert_eq!(request.clauses.len(), 4);

        let first = &request.clauses[0];
        assert_eq!(first.field, Field::FirstName);
        assert_eq!(first.query, "John");
        assert_eq!(first.max_edits, 2);
        assert_eq!(first.boost, 3);

        let email = &request.clauses[2];
        assert_eq!(email.field, Field::Email);
        assert_eq!(email.max_edits, 1);
        assert_eq!(email.boost, 5);

        let phone = &request.clauses[3];
        assert_eq!(phone.field, Field::Phone);
        assert_eq!(phone.max_edits, 1);
        assert_eq!(phone.boost, 2);
    }

    #[test]
    fn test_partial_fields_emit_partial_clauses() {
        let fields = CustomerFields::new().with_last_name("Smith");

        let request = build_search_request(&fields).expect("request");
        assert_eq!(request.clauses.len(), 1);
        assert_eq!(request.clauses[0].field, Field::LastName);
        assert_eq!(request.clauses[0].max_edits, 2);
        assert_eq!(request.clauses[0].boost, 3);
    }

    #[test]
    fn test_address_never_searched() {
        let fields = CustomerFields::new()
            .with_first_name("John")
            .with_address("12 Main St");

        let request = build_search_request(&fields).expect("request");
        assert!(request.clauses.iter().all(|c| c.field != Field::Address));
    }

    #[test]
    fn test_empty_fields_yield_no_request() {
        assert_eq!(build_search_request(&CustomerFields::new()), None);

        let address_only = CustomerFields::new().with_address("12 Main St");
        assert_eq!(build_search_request(&address_only), None);
    }
}
