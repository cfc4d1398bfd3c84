//! Wire types of the customer import endpoints.

use serde::{Deserialize, Deserializer, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// DuplicateStrategy
// ─────────────────────────────────────────────────────────────────────────────

/// Policy applied to every detected duplicate in one import run.
///
/// Serialized lowercase to match the `duplicate_strategy` form field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateStrategy {
    /// Leave existing records untouched and drop the incoming rows.
    #[default]
    Skip,
    /// Replace existing records with the incoming rows.
    Overwrite,
}

impl DuplicateStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DuplicateStrategy::Skip => "skip",
            DuplicateStrategy::Overwrite => "overwrite",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DuplicateStrategy::Skip => "Skip all duplicates",
            DuplicateStrategy::Overwrite => "Overwrite all duplicates",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Duplicate matches
// ─────────────────────────────────────────────────────────────────────────────

/// How sure the server is that two records describe the same customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchConfidence {
    High,
    Medium,
}

impl MatchConfidence {
    pub fn label(&self) -> &'static str {
        match self {
            MatchConfidence::High => "High confidence",
            MatchConfidence::Medium => "Medium confidence",
        }
    }
}

/// The customer already stored on the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistingRecord {
    /// Server-side identifier (numeric or string on the wire).
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    /// Account status, e.g. "active".
    #[serde(default)]
    pub status: Option<String>,
}

/// The CSV row that collides with an existing record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingRow {
    /// 1-based row number in the uploaded file.
    #[serde(alias = "row")]
    pub row_number: u64,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

/// One incoming row paired with the existing record it collides with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateMatch {
    #[serde(alias = "existing")]
    pub existing_record: ExistingRecord,
    #[serde(alias = "incoming")]
    pub incoming_row: IncomingRow,
    #[serde(alias = "confidence")]
    pub match_confidence: MatchConfidence,
}

/// A problem the server found with one row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    #[serde(alias = "row_number")]
    pub row: u64,
    #[serde(default)]
    pub field: Option<String>,
    #[serde(alias = "error")]
    pub message: String,
}

impl RowError {
    /// "Row 4 (email): invalid address"
    pub fn describe(&self) -> String {
        match &self.field {
            Some(field) => format!("Row {} ({}): {}", self.row, field, self.message),
            None => format!("Row {}: {}", self.row, self.message),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ValidationResult
// ─────────────────────────────────────────────────────────────────────────────

/// Server verdict on an uploaded file (`POST …/import/validate`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub total_rows: u64,
    pub valid_rows: u64,
    #[serde(default)]
    pub invalid_rows: Option<u64>,
    #[serde(default)]
    pub duplicates_found: u64,
    #[serde(default)]
    pub duplicates: Vec<DuplicateMatch>,
    #[serde(default)]
    pub errors: Vec<RowError>,
}

impl ValidationResult {
    /// Invalid row count, derived from the totals when the server omits it.
    pub fn invalid_count(&self) -> u64 {
        self.invalid_rows
            .unwrap_or_else(|| self.total_rows.saturating_sub(self.valid_rows))
    }

    /// True when the duplicate stage has something to show.
    pub fn has_duplicates(&self) -> bool {
        self.duplicates_found > 0 && !self.duplicates.is_empty()
    }

    /// True when `duplicates_found` disagrees with the returned list.
    pub fn duplicate_count_mismatch(&self) -> bool {
        self.duplicates_found != self.duplicates.len() as u64
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ImportResult
// ─────────────────────────────────────────────────────────────────────────────

/// Outcome of the batch import (`POST …/import`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportResult {
    pub total_rows: u64,
    pub created_count: u64,
    #[serde(default)]
    pub updated_count: u64,
    #[serde(default)]
    pub skipped_count: u64,
    pub failed_count: u64,
    #[serde(default)]
    pub errors: Vec<RowError>,
}

impl ImportResult {
    /// Created and failed rows never exceed the rows in the file.
    pub fn is_consistent(&self) -> bool {
        self.created_count
            .checked_add(self.failed_count)
            .map_or(false, |sum| sum <= self.total_rows)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Internal Wire Types
// ─────────────────────────────────────────────────────────────────────────────

/// Body of a non-2xx response.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ApiErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ApiErrorBody {
    pub(crate) fn into_message(self) -> Option<String> {
        self.error
            .or(self.message)
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Signed(i64),
    Unsigned(u64),
    Float(f64),
}

fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Signed(n) => n.to_string(),
        RawId::Unsigned(n) => n.to_string(),
        // `42.0` renders as `42`.
        RawId::Float(n) if n.is_finite() && n.fract() == 0.0 => format!("{:.0}", n),
        RawId::Float(n) => n.to_string(),
    })
}
