// Batch deduplication - sweep every record, group it with its duplicates,
// and emit a report. Offline counterpart of the interactive resolver.

use std::collections::HashSet;
use std::io::Write;
use std::time::Instant;

use serde::Serialize;
use tracing::{info, warn};

use crate::record::{CustomerRecord, ScoredDuplicate};
use crate::resolver::{DuplicateResolver, ResolveError};
use crate::settings::ThresholdConfig;
use crate::store::{RecordFilter, RecordStore, StoreError};

/// Batch runs use a lower bar than the interactive flow: the report is for
/// human review, so borderline groups are worth surfacing.
pub const BATCH_SIMILARITY_THRESHOLD: u32 = 60;

/// Candidates fetched per subject during the sweep.
pub const BATCH_CANDIDATE_LIMIT: usize = 20;

/// Raw score at or above which a duplicate is flagged safe to remove.
pub const HIGH_CONFIDENCE_REMOVAL_SCORE: u32 = 80;

#[derive(Debug, Clone, Serialize)]
pub struct DuplicateGroup {
    pub master: CustomerRecord,
    pub duplicates: Vec<ScoredDuplicate>,
    pub max_similarity: u32,
}

impl DuplicateGroup {
    pub fn group_size(&self) -> usize {
        self.duplicates.len() + 1
    }
}

#[derive(Debug, Serialize)]
pub struct DedupReport {
    pub total_records: usize,
    pub groups: Vec<DuplicateGroup>,
    pub elapsed_secs: f64,

    /// Ids of duplicates scoring high enough that removal is considered safe.
    pub high_confidence_ids: Vec<String>,
}

impl DedupReport {
    pub fn total_duplicates(&self) -> usize {
        self.groups.iter().map(|g| g.duplicates.len()).sum()
    }

    /// Human-readable summary block for logs and CLI output.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        out.push_str("DEDUPLICATION REPORT\n");
        out.push_str(&format!("Total records processed: {}\n", self.total_records));
        out.push_str(&format!("Duplicate groups found:  {}\n", self.groups.len()));
        out.push_str(&format!("Total duplicates:        {}\n", self.total_duplicates()));
        out.push_str(&format!(
            "High-confidence (score >= {}): {}\n",
            HIGH_CONFIDENCE_REMOVAL_SCORE,
            self.high_confidence_ids.len()
        ));
        out.push_str(&format!("Elapsed: {:.2}s\n", self.elapsed_secs));
        out
    }

    /// Write one CSV row per duplicate, with its group's master alongside.
    pub fn write_csv<W: Write>(&self, writer: W) -> csv::Result<()> {
        let mut w = csv::Writer::from_writer(writer);
        w.write_record([
            "group",
            "master_id",
            "master_name",
            "duplicate_id",
            "duplicate_name",
            "duplicate_email",
            "similarity_score",
            "confidence",
        ])?;
        for (i, group) in self.groups.iter().enumerate() {
            let master_name = group.master.fields.display_name();
            for dup in &group.duplicates {
                w.write_record([
                    &(i + 1).to_string(),
                    &group.master.id,
                    &master_name,
                    &dup.record.id,
                    &dup.record.fields.display_name(),
                    dup.record.fields.email.as_deref().unwrap_or(""),
                    &dup.similarity_score.to_string(),
                    dup.confidence.tier.as_str(),
                ])?;
            }
        }
        w.flush()?;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

/// Sweep the whole store for duplicate groups.
///
/// Each record acts as a subject at most once; every member of a found group
/// is marked processed so the same pair is never reported twice. Subjects
/// whose individual duplicate check fails are logged and skipped, the sweep
/// continues.
pub fn run_batch<S: RecordStore + ?Sized>(
    store: &S,
    settings: &ThresholdConfig,
) -> Result<DedupReport, BatchError> {
    let started = Instant::now();

    let mut batch_settings = settings.clone();
    batch_settings.similarity_threshold = BATCH_SIMILARITY_THRESHOLD;
    batch_settings.max_results = BATCH_CANDIDATE_LIMIT;
    batch_settings.validate().map_err(ResolveError::from)?;

    let total = store.count(RecordFilter::All)?;
    let records = store.list(RecordFilter::All, total)?;
    info!(total, "starting batch deduplication sweep");

    let resolver = DuplicateResolver::new(store);
    let mut processed: HashSet<String> = HashSet::new();
    let mut groups = Vec::new();

    for record in &records {
        if processed.contains(&record.id) {
            continue;
        }

        let duplicates = match resolver.resolve(
            &record.fields.searchable(),
            Some(&record.id),
            &batch_settings,
            BATCH_CANDIDATE_LIMIT,
        ) {
            Ok(duplicates) => duplicates,
            Err(e) => {
                warn!(id = %record.id, error = %e, "duplicate check failed, skipping subject");
                continue;
            }
        };

        let duplicates: Vec<ScoredDuplicate> = duplicates
            .into_iter()
            .filter(|d| !processed.contains(&d.record.id))
            .collect();
        if duplicates.is_empty() {
            continue;
        }

        processed.insert(record.id.clone());
        for dup in &duplicates {
            processed.insert(dup.record.id.clone());
        }

        let max_similarity = duplicates
            .iter()
            .map(|d| d.similarity_score)
            .max()
            .unwrap_or(0);
        groups.push(DuplicateGroup {
            master: record.clone(),
            duplicates,
            max_similarity,
        });
    }

    let mut high_confidence_ids = Vec::new();
    for group in &groups {
        for dup in &group.duplicates {
            if dup.similarity_score >= HIGH_CONFIDENCE_REMOVAL_SCORE {
                high_confidence_ids.push(dup.record.id.clone());
            }
        }
    }

    let report = DedupReport {
        total_records: total,
        groups,
        elapsed_secs: started.elapsed().as_secs_f64(),
        high_confidence_ids,
    };
    info!(
        groups = report.groups.len(),
        duplicates = report.total_duplicates(),
        high_confidence = report.high_confidence_ids.len(),
        "batch deduplication finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteStore;
    use crate::record::CustomerFields;
    use crate::store::NewRecord;

    fn seeded_store() -> (SqliteStore, String, String, String) {
        let store = SqliteStore::open_in_memory().unwrap();
        let master = store
            .insert(NewRecord::original(
                CustomerFields::new()
                    .with_first_name("John")
                    .with_last_name("Smith")
                    .with_email("john.smith@gmail.com")
                    .with_phone("(555) 123-4567"),
                "seed",
            ))
            .unwrap();
        // exact copy: 160
        let twin = store
            .insert(NewRecord::duplicate(
                CustomerFields::new()
                    .with_first_name("John")
                    .with_last_name("Smith")
                    .with_email("john.smith@gmail.com")
                    .with_phone("5551234567"),
                "seed",
            ))
            .unwrap();
        let unrelated = store
            .insert(NewRecord::original(
                CustomerFields::new()
                    .with_first_name("Zelda")
                    .with_last_name("Quarry")
                    .with_email("zq@other.org"),
                "seed",
            ))
            .unwrap();
        (store, master, twin, unrelated)
    }

    #[test]
    fn test_groups_exact_duplicates() {
        let (store, master, twin, unrelated) = seeded_store();
        let report = run_batch(&store, &ThresholdConfig::default()).unwrap();

        assert_eq!(report.total_records, 3);
        assert_eq!(report.groups.len(), 1);

        let group = &report.groups[0];
        let group_ids: Vec<&str> = std::iter::once(group.master.id.as_str())
            .chain(group.duplicates.iter().map(|d| d.record.id.as_str()))
            .collect();
        assert!(group_ids.contains(&master.as_str()));
        assert!(group_ids.contains(&twin.as_str()));
        assert!(!group_ids.contains(&unrelated.as_str()));
        assert_eq!(group.max_similarity, 160);
        assert_eq!(group.group_size(), 2);
    }

    #[test]
    fn test_pair_reported_once() {
        let (store, _, _, _) = seeded_store();
        let report = run_batch(&store, &ThresholdConfig::default()).unwrap();

        // the twin is processed as part of the master's group, so it never
        // opens a mirror group of its own
        assert_eq!(report.groups.len(), 1);
        assert_eq!(report.total_duplicates(), 1);
    }

    #[test]
    fn test_high_confidence_ids_flagged() {
        let (store, master, twin, _) = seeded_store();
        let report = run_batch(&store, &ThresholdConfig::default()).unwrap();

        assert_eq!(report.high_confidence_ids.len(), 1);
        let flagged = &report.high_confidence_ids[0];
        assert!(flagged == &twin || flagged == &master);
    }

    #[test]
    fn test_empty_store_yields_empty_report() {
        let store = SqliteStore::open_in_memory().unwrap();
        let report = run_batch(&store, &ThresholdConfig::default()).unwrap();
        assert_eq!(report.total_records, 0);
        assert!(report.groups.is_empty());
        assert!(report.high_confidence_ids.is_empty());
    }

    #[test]
    fn test_csv_export() {
        let (store, _, _, _) = seeded_store();
        let report = run_batch(&store, &ThresholdConfig::default()).unwrap();

        let mut buf = Vec::new();
        report.write_csv(&mut buf).unwrap();
        let csv = String::from_utf8(buf).unwrap();

        let mut lines = csv.lines();
        assert!(lines.next().unwrap().starts_with("group,master_id"));
        assert_eq!(lines.count(), report.total_duplicates());
        assert!(csv.contains("160"));
    }

    #[test]
    fn test_summary_mentions_counts() {
        let (store, _, _, _) = seeded_store();
        let report = run_batch(&store, &ThresholdConfig::default()).unwrap();
        let summary = report.summary();
        assert!(summary.contains("Duplicate groups found:  1"));
        assert!(summary.contains("Total records processed: 3"));
    }
}
