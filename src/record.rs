// Customer record model
// CustomerFields is the value type the matching core works on; CustomerRecord
// is what the record store owns (identity, timestamps, provenance).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::confidence::Confidence;

// ============================================================================
// FIELDS
// ============================================================================

/// The five customer attributes this system knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    FirstName,
    LastName,
    Email,
    Phone,
    Address,
}

impl Field {
    /// Column / wire name for this field.
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::FirstName => "first_name",
            Field::LastName => "last_name",
            Field::Email => "email",
            Field::Phone => "phone",
            Field::Address => "address",
        }
    }

    /// Fields the duplicate search looks at. Address is stored but never
    /// used for matching.
    pub const SEARCHABLE: [Field; 4] =
        [Field::FirstName, Field::LastName, Field::Email, Field::Phone];

    /// Fields a merge can pick a winning side for.
    pub const MERGEABLE: [Field; 5] = [
        Field::FirstName,
        Field::LastName,
        Field::Email,
        Field::Phone,
        Field::Address,
    ];
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Semantic customer attributes. Any subset may be absent; absent or blank
/// fields never contribute to scoring or search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl CustomerFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a field value, trimmed. Returns `None` for absent or
    /// whitespace-only values.
    pub fn get(&self, field: Field) -> Option<&str> {
        let raw = match field {
            Field::FirstName => self.first_name.as_deref(),
            Field::LastName => self.last_name.as_deref(),
            Field::Email => self.email.as_deref(),
            Field::Phone => self.phone.as_deref(),
            Field::Address => self.address.as_deref(),
        };
        raw.map(str::trim).filter(|v| !v.is_empty())
    }

    pub fn set(&mut self, field: Field, value: Option<String>) {
        let slot = match field {
            Field::FirstName => &mut self.first_name,
            Field::LastName => &mut self.last_name,
            Field::Email => &mut self.email,
            Field::Phone => &mut self.phone,
            Field::Address => &mut self.address,
        };
        *slot = value.filter(|v| !v.trim().is_empty());
    }

    /// True when no field carries a value.
    pub fn is_empty(&self) -> bool {
        Field::MERGEABLE.iter().all(|f| self.get(*f).is_none())
    }

    /// Searchable fields that carry a value.
    pub fn supplied_search_fields(&self) -> Vec<Field> {
        Field::SEARCHABLE
            .iter()
            .copied()
            .filter(|f| self.get(*f).is_some())
            .collect()
    }

    /// Copy with the address dropped — the subset the duplicate check runs on.
    pub fn searchable(&self) -> CustomerFields {
        CustomerFields {
            address: None,
            ..self.clone()
        }
    }

    /// "First Last" for log lines and CLI output.
    pub fn display_name(&self) -> String {
        match (self.get(Field::FirstName), self.get(Field::LastName)) {
            (Some(f), Some(l)) => format!("{} {}", f, l),
            (Some(f), None) => f.to_string(),
            (None, Some(l)) => l.to_string(),
            (None, None) => "(unnamed)".to_string(),
        }
    }

    // Builder-style setters, mainly for tests and CLI assembly

    pub fn with_first_name(mut self, value: &str) -> Self {
        self.set(Field::FirstName, Some(value.to_string()));
        self
    }

    pub fn with_last_name(mut self, value: &str) -> Self {
        self.set(Field::LastName, Some(value.to_string()));
        self
    }

    pub fn with_email(mut self, value: &str) -> Self {
        self.set(Field::Email, Some(value.to_string()));
        self
    }

    pub fn with_phone(mut self, value: &str) -> Self {
        self.set(Field::Phone, Some(value.to_string()));
        self
    }

    pub fn with_address(mut self, value: &str) -> Self {
        self.set(Field::Address, Some(value.to_string()));
        self
    }
}

// ============================================================================
// RECORD
// ============================================================================

/// Informational tag: whether a record entered the store as a clean original
/// or as a known duplicate (synthetic data keeps this honest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordType {
    Original,
    Duplicate,
}

impl RecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::Original => "original",
            RecordType::Duplicate => "duplicate",
        }
    }

    pub fn parse(value: &str) -> Option<RecordType> {
        match value {
            "original" => Some(RecordType::Original),
            "duplicate" => Some(RecordType::Duplicate),
            _ => None,
        }
    }
}

/// Provenance flags stamped by the workflows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,

    /// Set when an agent explicitly confirmed "not a duplicate" and
    /// proceeded anyway.
    #[serde(default)]
    pub confirmed_not_duplicate: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merged_by: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_source: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_merge_date: Option<DateTime<Utc>>,
}

/// A customer document as the record store holds it. The engine reads these
/// and, during merge, requests mutations; it never constructs identities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecord {
    /// Opaque identifier, assigned by the store on insert.
    pub id: String,

    #[serde(flatten)]
    pub fields: CustomerFields,

    pub record_type: RecordType,

    pub created_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,

    #[serde(flatten)]
    pub provenance: Provenance,
}

// ============================================================================
// SEARCH RESULTS
// ============================================================================

/// A record returned by the store's fuzzy search, annotated with the store's
/// own relevance score. Relevance is not comparable across queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchCandidate {
    #[serde(flatten)]
    pub record: CustomerRecord,

    pub search_score: f64,
}

/// A fully scored duplicate candidate — the unit the resolver returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredDuplicate {
    #[serde(flatten)]
    pub record: CustomerRecord,

    /// Store relevance for the query that produced this candidate.
    pub search_score: f64,

    /// Deterministic weighted field score, 0-160.
    pub similarity_score: u32,

    pub confidence: Confidence,
}
