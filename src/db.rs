// SQLite-backed record store.
//
// Stands in for the hosted document store the engine was designed against.
// Fuzzy ranking happens in process: each clause contributes its boost scaled
// by how close the edit distance came to the allowed maximum. That formula is
// store-internal — the engine never sees anything but the ranked result.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::query::{FuzzySearchRequest, SearchClause};
use crate::record::{CustomerFields, CustomerRecord, Provenance, RecordType, SearchCandidate};
use crate::scoring::normalize_phone;
use crate::store::{NewRecord, RecordFilter, RecordStore, RecordUpdate, StoreError};

/// How long a connection waits on a locked database before failing fast.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) a store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|e| StoreError::Unavailable {
            reason: e.to_string(),
        })?;
        Self::init(conn)
    }

    /// In-memory store, used by tests and throwaway demos.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|e| StoreError::Unavailable {
            reason: e.to_string(),
        })?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.busy_timeout(BUSY_TIMEOUT).map_err(backend)?;
        // WAL for concurrent reader friendliness; no-op on in-memory databases
        conn.pragma_update(None, "journal_mode", "WAL").ok();

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS customers (
                id TEXT PRIMARY KEY,
                first_name TEXT,
                last_name TEXT,
                email TEXT,
                phone TEXT,
                address TEXT,
                record_type TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT,
                created_by TEXT,
                updated_by TEXT,
                confirmed_not_duplicate INTEGER NOT NULL DEFAULT 0,
                merged_by TEXT,
                merge_source TEXT,
                last_merge_date TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_customers_record_type
                ON customers(record_type);",
        )
        .map_err(backend)?;

        Ok(SqliteStore { conn })
    }

    /// Delete every record. Used by `generate --reset`.
    pub fn clear(&self) -> Result<usize, StoreError> {
        self.conn
            .execute("DELETE FROM customers", [])
            .map_err(backend)
    }

    fn load_all(&self) -> Result<Vec<CustomerRecord>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM customers")
            .map_err(backend)?;
        let rows = stmt
            .query_map([], row_to_record)
            .map_err(backend)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(backend)?;
        Ok(rows)
    }
}

fn backend(e: rusqlite::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn parse_timestamp(value: Option<String>) -> Option<DateTime<Utc>> {
    value
        .as_deref()
        .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<CustomerRecord> {
    let record_type: String = row.get("record_type")?;
    let created_at: String = row.get("created_at")?;

    Ok(CustomerRecord {
        id: row.get("id")?,
        fields: CustomerFields {
            first_name: row.get("first_name")?,
            last_name: row.get("last_name")?,
            email: row.get("email")?,
            phone: row.get("phone")?,
            address: row.get("address")?,
        },
        record_type: RecordType::parse(&record_type).unwrap_or(RecordType::Original),
        created_at: parse_timestamp(Some(created_at)).unwrap_or_else(Utc::now),
        updated_at: parse_timestamp(row.get("updated_at")?),
        provenance: Provenance {
            created_by: row.get("created_by")?,
            updated_by: row.get("updated_by")?,
            confirmed_not_duplicate: row.get::<_, i64>("confirmed_not_duplicate")? != 0,
            merged_by: row.get("merged_by")?,
            merge_source: row.get("merge_source")?,
            last_merge_date: parse_timestamp(row.get("last_merge_date")?),
        },
    })
}

// ============================================================================
// FUZZY RANKING (store-side)
// ============================================================================

/// Relevance contribution of one clause against one field value, or `None`
/// when the value is outside the clause's edit budget.
fn clause_relevance(clause: &SearchClause, value: Option<&str>) -> Option<f64> {
    let value = value?;

    let (query, value) = if clause.field == crate::record::Field::Phone {
        (normalize_phone(&clause.query), normalize_phone(value))
    } else {
        (
            clause.query.trim().to_lowercase(),
            value.trim().to_lowercase(),
        )
    };
    if query.is_empty() || value.is_empty() {
        return None;
    }

    // Best distance across the whole value and its tokens, so "john" still
    // matches "john.smith@gmail.com" and "Smith" matches "Smith-Jones".
    let max_edits = clause.max_edits as usize;
    let mut best: Option<usize> = None;
    let mut consider = |candidate: &str| {
        // length difference is a lower bound on edit distance
        if candidate.len().abs_diff(query.len()) > max_edits {
            return;
        }
        let dist = strsim::levenshtein(&query, candidate);
        if best.map_or(true, |b| dist < b) {
            best = Some(dist);
        }
    };

    consider(&value);
    for token in value.split(|c: char| !c.is_alphanumeric()) {
        if !token.is_empty() {
            consider(token);
        }
    }

    match best {
        Some(dist) if dist <= max_edits => {
            // closer matches earn more of the boost
            Some(clause.boost as f64 * (1.0 + (max_edits - dist) as f64))
        }
        _ => None,
    }
}

/// Combined relevance of a record for a request. `None` when fewer clauses
/// matched than the request requires.
fn record_relevance(request: &FuzzySearchRequest, fields: &CustomerFields) -> Option<f64> {
    let mut score = 0.0;
    let mut matched = 0u32;

    for clause in &request.clauses {
        if let Some(contribution) = clause_relevance(clause, fields.get(clause.field)) {
            score += contribution;
            matched += 1;
        }
    }

    if matched >= request.minimum_should_match {
        Some(score)
    } else {
        None
    }
}

// ============================================================================
// RECORD STORE IMPL
// ============================================================================

impl RecordStore for SqliteStore {
    fn find_by_id(&self, id: &str) -> Result<Option<CustomerRecord>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM customers WHERE id = ?1")
            .map_err(backend)?;
        let mut rows = stmt.query_map(params![id], row_to_record).map_err(backend)?;
        match rows.next() {
            Some(row) => Ok(Some(row.map_err(backend)?)),
            None => Ok(None),
        }
    }

    fn fuzzy_search(
        &self,
        request: &FuzzySearchRequest,
        overfetch: usize,
    ) -> Result<Vec<SearchCandidate>, StoreError> {
        // Linear scan with in-process ranking; the table is demo-sized.
        let records = self.load_all()?;
        let scanned = records.len();

        let mut candidates: Vec<SearchCandidate> = records
            .into_iter()
            .filter_map(|record| {
                record_relevance(request, &record.fields).map(|search_score| SearchCandidate {
                    record,
                    search_score,
                })
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.search_score
                .partial_cmp(&a.search_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates.truncate(overfetch);

        debug!(
            scanned,
            matched = candidates.len(),
            clauses = request.clauses.len(),
            "fuzzy search complete"
        );
        Ok(candidates)
    }

    fn insert(&self, record: NewRecord) -> Result<String, StoreError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();

        self.conn
            .execute(
                "INSERT INTO customers (
                    id, first_name, last_name, email, phone, address,
                    record_type, created_at, created_by, confirmed_not_duplicate
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    id,
                    record.fields.first_name,
                    record.fields.last_name,
                    record.fields.email,
                    record.fields.phone,
                    record.fields.address,
                    record.record_type.as_str(),
                    now.to_rfc3339(),
                    record.created_by,
                    record.confirmed_not_duplicate as i64,
                ],
            )
            .map_err(backend)?;

        Ok(id)
    }

    fn update(&self, id: &str, update: RecordUpdate) -> Result<(), StoreError> {
        let now = Utc::now();
        let (merged_by, merge_source, merge_date) = match &update.merge_stamp {
            Some(stamp) => (
                Some(stamp.merged_by.clone()),
                Some(stamp.merge_source.clone()),
                Some(now.to_rfc3339()),
            ),
            None => (None, None, None),
        };

        let changed = self
            .conn
            .execute(
                "UPDATE customers SET
                    first_name = ?2, last_name = ?3, email = ?4,
                    phone = ?5, address = ?6,
                    updated_at = ?7, updated_by = ?8,
                    confirmed_not_duplicate = ?9,
                    merged_by = COALESCE(?10, merged_by),
                    merge_source = COALESCE(?11, merge_source),
                    last_merge_date = COALESCE(?12, last_merge_date)
                 WHERE id = ?1",
                params![
                    id,
                    update.fields.first_name,
                    update.fields.last_name,
                    update.fields.email,
                    update.fields.phone,
                    update.fields.address,
                    now.to_rfc3339(),
                    update.updated_by,
                    update.confirmed_not_duplicate as i64,
                    merged_by,
                    merge_source,
                    merge_date,
                ],
            )
            .map_err(backend)?;

        if changed == 0 {
            return Err(StoreError::NotFound { id: id.to_string() });
        }
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<(), StoreError> {
        let changed = self
            .conn
            .execute("DELETE FROM customers WHERE id = ?1", params![id])
            .map_err(backend)?;
        if changed == 0 {
            return Err(StoreError::NotFound { id: id.to_string() });
        }
        Ok(())
    }

    fn count(&self, filter: RecordFilter) -> Result<usize, StoreError> {
        let count: i64 = match filter {
            RecordFilter::All => self
                .conn
                .query_row("SELECT COUNT(*) FROM customers", [], |row| row.get(0)),
            RecordFilter::ByType(record_type) => self.conn.query_row(
                "SELECT COUNT(*) FROM customers WHERE record_type = ?1",
                params![record_type.as_str()],
                |row| row.get(0),
            ),
        }
        .map_err(backend)?;
        Ok(count as usize)
    }

    fn list(&self, filter: RecordFilter, limit: usize) -> Result<Vec<CustomerRecord>, StoreError> {
        let (sql, type_param) = match filter {
            RecordFilter::All => (
                "SELECT * FROM customers
                 ORDER BY record_type, last_name, first_name LIMIT ?1",
                None,
            ),
            RecordFilter::ByType(record_type) => (
                "SELECT * FROM customers WHERE record_type = ?2
                 ORDER BY record_type, last_name, first_name LIMIT ?1",
                Some(record_type.as_str()),
            ),
        };

        let mut stmt = self.conn.prepare(sql).map_err(backend)?;
        let rows = match type_param {
            None => stmt.query_map(params![limit as i64], row_to_record),
            Some(record_type) => stmt.query_map(params![limit as i64, record_type], row_to_record),
        }
        .map_err(backend)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(backend)
    }
}
