// Duplicate Resolver - the central decision pipeline.
//
// Build a fuzzy-search request, let the record store rank candidates, then
// apply the deterministic side: self-match suppression, the manual-search
// false-positive rule, the similarity scorer, dual thresholds, confidence
// tiers, and final ordering.

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::confidence::classify;
use crate::query::build_search_request;
use crate::record::{CustomerFields, CustomerRecord, Field, ScoredDuplicate};
use crate::scoring::{normalize_phone, similarity_score};
use crate::settings::{ThresholdConfig, ValidationError};
use crate::store::RecordStore;

/// Resolve failure taxonomy. `SearchUnavailable` is recoverable: the caller
/// got no results, not a crash, and may retry or tell the user.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    #[error(transparent)]
    InvalidSettings(#[from] ValidationError),

    #[error("duplicate search unavailable: {reason}")]
    SearchUnavailable { reason: String },
}

/// Finds likely duplicates of a subject among the store's records.
pub struct DuplicateResolver<'a, S: RecordStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: RecordStore + ?Sized> DuplicateResolver<'a, S> {
    pub fn new(store: &'a S) -> Self {
        DuplicateResolver { store }
    }

    /// Resolve duplicates for `subject`.
    ///
    /// `subject_id` is the subject's own record id when the subject already
    /// exists in the store; it is excluded from the results. When absent the
    /// subject is treated as ad-hoc input and the manual-search suppression
    /// rule applies instead.
    ///
    /// Returns at most `limit` entries, sorted by similarity score
    /// descending (ties keep the store's relevance order). An empty result
    /// is a normal outcome, not an error.
    pub fn resolve(
        &self,
        subject: &CustomerFields,
        subject_id: Option<&str>,
        settings: &ThresholdConfig,
        limit: usize,
    ) -> Result<Vec<ScoredDuplicate>, ResolveError> {
        settings.validate()?;

        let request = match build_search_request(subject) {
            Some(request) => request,
            None => {
                info!("no searchable fields provided");
                return Ok(Vec::new());
            }
        };

        // Over-fetch so threshold filtering still leaves enough results.
        let overfetch = limit.saturating_mul(2).max(limit);
        let candidates = self
            .store
            .fuzzy_search(&request, overfetch)
            .map_err(|e| {
                warn!(error = %e, "fuzzy search failed");
                ResolveError::SearchUnavailable {
                    reason: e.to_string(),
                }
            })?;
        debug!(candidates = candidates.len(), "search returned candidates");

        let manual_search = subject_id.is_none();
        let supplied = subject.supplied_search_fields();

        let mut results: Vec<ScoredDuplicate> = Vec::new();
        for candidate in candidates {
            // A record is never a duplicate of itself.
            if subject_id == Some(candidate.record.id.as_str()) {
                debug!(id = %candidate.record.id, "skipping self-match");
                continue;
            }

            // Manual searches whose supplied fields all match a record
            // exactly found the same person, not a duplicate of them.
            if manual_search
                && supplied.len() >= 2
                && matches_all_supplied(subject, &supplied, &candidate.record)
            {
                debug!(id = %candidate.record.id, "skipping exact match for manual search");
                continue;
            }

            let similarity = similarity_score(subject, &candidate.record.fields);
            if similarity < settings.similarity_threshold
                || candidate.search_score < settings.search_score_threshold
            {
                continue;
            }

            results.push(ScoredDuplicate {
                confidence: classify(similarity, settings),
                similarity_score: similarity,
                search_score: candidate.search_score,
                record: candidate.record,
            });
        }

        // Stable sort: equal similarity keeps relevance order.
        results.sort_by(|a, b| b.similarity_score.cmp(&a.similarity_score));
        results.truncate(limit);

        info!(qualified = results.len(), "duplicate resolution complete");
        Ok(results)
    }
}

/// Does the candidate match every supplied subject field exactly?
/// Names and email compare case-insensitively; phones on digits only.
fn matches_all_supplied(
    subject: &CustomerFields,
    supplied: &[Field],
    candidate: &CustomerRecord,
) -> bool {
    supplied.iter().all(|&field| {
        let subject_value = match subject.get(field) {
            Some(value) => value,
            None => return true,
        };
        let candidate_value = candidate.fields.get(field).unwrap_or("");

        match field {
            Field::Phone => normalize_phone(subject_value) == normalize_phone(candidate_value),
            _ => subject_value.eq_ignore_ascii_case(candidate_value),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::FuzzySearchRequest;
    use crate::record::{Provenance, RecordType, SearchCandidate};
    use crate::store::{NewRecord, RecordFilter, RecordUpdate, StoreError};
    use chrono::Utc;
    use std::cell::Cell;

    /// Store stub returning a scripted candidate list, in order.
    struct StubStore {
        candidates: Vec<SearchCandidate>,
        fail: bool,
        searches: Cell<usize>,
    }

    impl StubStore {
        fn with(candidates: Vec<SearchCandidate>) -> Self {
            StubStore {
                candidates,
                fail: false,
                searches: Cell::new(0),
            }
        }

        fn failing() -> Self {
            StubStore {
                candidates: Vec::new(),
                fail: true,
                searches: Cell::new(0),
            }
        }
    }

    impl RecordStore for StubStore {
        fn find_by_id(&self, _id: &str) -> Result<Option<CustomerRecord>, StoreError> {
            Ok(None)
        }

        fn fuzzy_search(
            &self,
            _request: &FuzzySearchRequest,
            overfetch: usize,
        ) -> Result<Vec<SearchCandidate>, StoreError> {
            self.searches.set(self.searches.get() + 1);
            if self.fail {
                return Err(StoreError::Unavailable {
                    reason: "connection refused".to_string(),
                });
            }
            Ok(self.candidates.iter().take(overfetch).cloned().collect())
        }

        fn insert(&self, _record: NewRecord) -> Result<String, StoreError> {
            unimplemented!("stub")
        }

        fn update(&self, _id: &str, _update: RecordUpdate) -> Result<(), StoreError> {
            unimplemented!("stub")
        }

        fn delete(&self, _id: &str) -> Result<(), StoreError> {
            unimplemented!("stub")
        }

        fn count(&self, _filter: RecordFilter) -> Result<usize, StoreError> {
            Ok(self.candidates.len())
        }

        fn list(
            &self,
            _filter: RecordFilter,
            _limit: usize,
        ) -> Result<Vec<CustomerRecord>, StoreError> {
            Ok(Vec::new())
        }
    }

    fn record(id: &str, first: &str, last: &str, email: &str, phone: &str) -> CustomerRecord {
        let mut fields = CustomerFields::new();
        if !first.is_empty() {
            fields = fields.with_first_name(first);
        }
        if !last.is_empty() {
            fields = fields.with_last_name(last);
        }
        if !email.is_empty() {
            fields = fields.with_email(email);
        }
        if !phone.is_empty() {
            fields = fields.with_phone(phone);
        }
        CustomerRecord {
            id: id.to_string(),
            fields,
            record_type: RecordType::Original,
            created_at: Utc::now(),
            updated_at: None,
            provenance: Provenance::default(),
        }
    }

    fn candidate(record: CustomerRecord, search_score: f64) -> SearchCandidate {
        SearchCandidate {
            record,
            search_score,
        }
    }

    fn subject_john() -> CustomerFields {
        CustomerFields::new()
            .with_first_name("John")
            .with_last_name("Smith")
            .with_email("john@x.com")
    }

    #[test]
    fn test_empty_subject_short_circuits() {
        let store = StubStore::failing();
        let resolver = DuplicateResolver::new(&store);

        let results = resolver
            .resolve(
                &CustomerFields::new(),
                None,
                &ThresholdConfig::default(),
                10,
            )
            .unwrap();
        assert!(results.is_empty());
        assert_eq!(store.searches.get(), 0, "no store call for empty query");
    }

    #[test]
    fn test_invalid_settings_rejected_before_store_call() {
        let store = StubStore::failing();
        let resolver = DuplicateResolver::new(&store);
        let settings = ThresholdConfig {
            similarity_threshold: 999,
            ..ThresholdConfig::default()
        };

        let err = resolver
            .resolve(&subject_john(), None, &settings, 10)
            .unwrap_err();
        assert!(matches!(err, ResolveError::InvalidSettings(_)));
        assert_eq!(store.searches.get(), 0);
    }

    #[test]
    fn test_store_failure_is_search_unavailable() {
        let store = StubStore::failing();
        let resolver = DuplicateResolver::new(&store);

        let err = resolver
            .resolve(&subject_john(), None, &ThresholdConfig::default(), 10)
            .unwrap_err();
        assert!(matches!(err, ResolveError::SearchUnavailable { .. }));
    }

    #[test]
    fn test_self_match_excluded() {
        let store = StubStore::with(vec![
            candidate(record("self", "John", "Smith", "john@x.com", ""), 9.0),
            candidate(record("other", "Jon", "Smith", "john@x.com", ""), 7.0),
        ]);
        let resolver = DuplicateResolver::new(&store);

        let results = resolver
            .resolve(
                &subject_john(),
                Some("self"),
                &ThresholdConfig::default(),
                10,
            )
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].record.id, "other");
    }

    #[test]
    fn test_manual_search_exact_match_suppressed() {
        // Both supplied fields match the candidate exactly: same person,
        // not a duplicate.
        let subject = CustomerFields::new()
            .with_first_name("John")
            .with_email("John@X.com");
        let store = StubStore::with(vec![candidate(
            record("c1", "john", "Smith", "john@x.com", "555"),
            9.0,
        )]);
        let resolver = DuplicateResolver::new(&store);

        let results = resolver
            .resolve(&subject, None, &ThresholdConfig::default(), 10)
            .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_manual_suppression_needs_two_fields() {
        let subject = CustomerFields::new().with_email("john@x.com");
        let store = StubStore::with(vec![candidate(
            record("c1", "John", "Smith", "john@x.com", ""),
            9.0,
        )]);
        let resolver = DuplicateResolver::new(&store);

        let results = resolver
            .resolve(&subject, None, &ThresholdConfig::default(), 10)
            .unwrap();
        assert_eq!(results.len(), 1, "single-field search is not suppressed");
    }

    #[test]
    fn test_manual_suppression_skipped_when_subject_id_present() {
        let store = StubStore::with(vec![candidate(
            record("c1", "John", "Smith", "john@x.com", ""),
            9.0,
        )]);
        let resolver = DuplicateResolver::new(&store);

        let results = resolver
            .resolve(
                &subject_john(),
                Some("different-id"),
                &ThresholdConfig::default(),
                10,
            )
            .unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_manual_suppression_normalizes_phone() {
        let subject = CustomerFields::new()
            .with_last_name("Smith")
            .with_phone("(555) 123-4567");
        let store = StubStore::with(vec![candidate(
            record("c1", "John", "Smith", "", "555-123-4567"),
            5.0,
        )]);
        let resolver = DuplicateResolver::new(&store);

        let results = resolver
            .resolve(&subject, None, &ThresholdConfig::default(), 10)
            .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_both_thresholds_must_pass() {
        let store = StubStore::with(vec![
            // high similarity, low search relevance
            candidate(record("a", "John", "Smith", "john@x.com", ""), 0.5),
            // low similarity, high search relevance
            candidate(record("b", "Mary", "Quinn", "mq@z.org", ""), 20.0),
            // passes both
            candidate(record("c", "Jon", "Smith", "john@y.com", ""), 8.0),
        ]);
        let resolver = DuplicateResolver::new(&store);
        let settings = ThresholdConfig {
            similarity_threshold: 50,
            search_score_threshold: 1.0,
            ..ThresholdConfig::default()
        };

        let results = resolver
            .resolve(&subject_john(), Some("x"), &settings, 10)
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].record.id, "c");
        // partial first (20) + exact last (40) + email username (30)
        assert_eq!(results[0].similarity_score, 90);
    }

    #[test]
    fn test_sorted_by_similarity_and_truncated() {
        let store = StubStore::with(vec![
            candidate(record("low", "Jon", "Smythe", "other@z.com", ""), 9.0),
            candidate(record("high", "John", "Smith", "john@x.com", ""), 5.0),
            candidate(record("mid", "John", "Smith", "nope@z.com", ""), 4.0),
        ]);
        let resolver = DuplicateResolver::new(&store);

        let results = resolver
            .resolve(&subject_john(), Some("x"), &ThresholdConfig::default(), 2)
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].record.id, "high");
        assert_eq!(results[1].record.id, "mid");
        assert!(results[0].similarity_score >= results[1].similarity_score);
    }

    #[test]
    fn test_ties_keep_relevance_order() {
        let store = StubStore::with(vec![
            candidate(record("first", "John", "", "", ""), 9.0),
            candidate(record("second", "John", "", "", ""), 7.0),
        ]);
        let resolver = DuplicateResolver::new(&store);

        let results = resolver
            .resolve(
                &CustomerFields::new().with_first_name("John"),
                Some("x"),
                &ThresholdConfig::default(),
                10,
            )
            .unwrap();
        assert_eq!(results[0].record.id, "first");
        assert_eq!(results[1].record.id, "second");
    }

    #[test]
    fn test_no_qualifying_candidates_is_empty_not_error() {
        let store = StubStore::with(Vec::new());
        let resolver = DuplicateResolver::new(&store);
        let settings = ThresholdConfig {
            similarity_threshold: 0,
            search_score_threshold: 0.0,
            max_results: 10,
            ..ThresholdConfig::default()
        };

        let results = resolver
            .resolve(&subject_john(), None, &settings, 10)
            .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_confidence_attached() {
        let store = StubStore::with(vec![candidate(
            record("c", "John", "Smith", "john@x.com", ""),
            5.0,
        )]);
        let resolver = DuplicateResolver::new(&store);

        let results = resolver
            .resolve(&subject_john(), Some("x"), &ThresholdConfig::default(), 10)
            .unwrap();
        // 40 + 40 + 60 = 140 → 87.5% → high
        assert_eq!(results[0].similarity_score, 140);
        assert_eq!(
            results[0].confidence.tier,
            crate::confidence::ConfidenceTier::High
        );
    }
}
