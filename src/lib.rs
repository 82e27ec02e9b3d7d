// Consumer Deduplication Engine - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod confidence;
pub mod db;
pub mod generator;
pub mod merge;
pub mod query;
pub mod record;
pub mod report;
pub mod resolver;
pub mod scoring;
pub mod settings;
pub mod store;

// Re-export commonly used types
pub use confidence::{classify, score_percentage, Confidence, ConfidenceTier};
pub use db::SqliteStore;
pub use generator::{populate, GeneratedCounts, GeneratorConfig};
pub use merge::{
    DraftAction, MergeError, MergeSelection, MergeWorkflow, ResolutionChoice,
    ResolvedOutcome, SubmitOutcome, WorkflowState,
};
pub use query::{build_search_request, FuzzySearchRequest, SearchClause};
pub use record::{
    CustomerFields, CustomerRecord, Field, Provenance, RecordType, ScoredDuplicate,
    SearchCandidate,
};
pub use report::{run_batch, BatchError, DedupReport, DuplicateGroup};
pub use resolver::{DuplicateResolver, ResolveError};
pub use scoring::{normalize_phone, similarity_score, MAX_SIMILARITY_SCORE};
pub use settings::{ThresholdConfig, ValidationError, MAX_RESULTS_LIMIT};
pub use store::{
    MergeStamp, NewRecord, RecordFilter, RecordStore, RecordUpdate, StoreError,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
