// Record store interface - the seam between the decision engine and
// whatever holds the customer documents.
//
// The engine only needs this narrow surface: lookup by id, a ranked fuzzy
// search, plain CRUD, and counts for the presentation layer. The store's
// relevance scoring is its own business; the engine consumes it opaquely.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::query::FuzzySearchRequest;
use crate::record::{CustomerFields, CustomerRecord, RecordType, SearchCandidate};

/// Store failure taxonomy. The engine performs no retries; callers decide.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// The store could not be reached or the search could not run.
    #[error("record store unavailable: {reason}")]
    Unavailable { reason: String },

    /// A read or write addressed a record that does not exist.
    #[error("record not found: {id}")]
    NotFound { id: String },

    /// A write could not be applied to the addressed record.
    #[error("write conflict on record {id}: {reason}")]
    Conflict { id: String, reason: String },

    /// Anything else the backend reported.
    #[error("record store error: {0}")]
    Backend(String),
}

/// Filter for counts and listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordFilter {
    All,
    ByType(RecordType),
}

/// Payload for an insert. The store assigns the id and creation timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRecord {
    pub fields: CustomerFields,
    pub record_type: RecordType,
    pub created_by: String,
    pub confirmed_not_duplicate: bool,
}

impl NewRecord {
    /// A plain original record, as the create flow produces.
    pub fn original(fields: CustomerFields, created_by: &str) -> Self {
        NewRecord {
            fields,
            record_type: RecordType::Original,
            created_by: created_by.to_string(),
            confirmed_not_duplicate: false,
        }
    }

    /// A known duplicate, as the synthetic data generator produces.
    pub fn duplicate(fields: CustomerFields, created_by: &str) -> Self {
        NewRecord {
            fields,
            record_type: RecordType::Duplicate,
            created_by: created_by.to_string(),
            confirmed_not_duplicate: false,
        }
    }
}

/// Merge provenance to stamp alongside an update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeStamp {
    pub merged_by: String,
    pub merge_source: String,
}

/// Payload for an update: a single atomic field-set replace plus provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordUpdate {
    pub fields: CustomerFields,
    pub updated_by: String,
    pub confirmed_not_duplicate: bool,

    /// Present only when the update is the write half of a merge.
    pub merge_stamp: Option<MergeStamp>,
}

/// Minimal store surface the engine requires.
pub trait RecordStore {
    fn find_by_id(&self, id: &str) -> Result<Option<CustomerRecord>, StoreError>;

    /// Execute a fuzzy search, returning up to `overfetch` candidates sorted
    /// by descending relevance. Relevance is implementation-defined and only
    /// consistent within one call.
    fn fuzzy_search(
        &self,
        request: &FuzzySearchRequest,
        overfetch: usize,
    ) -> Result<Vec<SearchCandidate>, StoreError>;

    /// Insert a new record, returning its store-assigned id.
    fn insert(&self, record: NewRecord) -> Result<String, StoreError>;

    fn update(&self, id: &str, update: RecordUpdate) -> Result<(), StoreError>;

    fn delete(&self, id: &str) -> Result<(), StoreError>;

    fn count(&self, filter: RecordFilter) -> Result<usize, StoreError>;

    /// List records matching a filter, up to `limit`. Used by the browse
    /// page and the batch report, not by the resolver.
    fn list(&self, filter: RecordFilter, limit: usize) -> Result<Vec<CustomerRecord>, StoreError>;
}
