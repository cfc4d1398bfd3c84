pub mod client;
pub mod types;

pub use client::{sanitize_url_for_logs, ImportApiClient, LoggingMode};
pub use types::{
    DuplicateMatch, DuplicateStrategy, ExistingRecord, ImportResult, IncomingRow,
    MatchConfidence, RowError, ValidationResult,
};
