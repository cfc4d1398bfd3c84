//! Client-side acceptance checks for the upload stage.
//!
//! These run before any network call. A rejected file never reaches the
//! validation endpoint.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncReadExt;

use crate::error::AppError;

/// MIME types browsers and operating systems report for CSV files.
const CSV_MIME_TYPES: &[&str] = &[
    "text/csv",
    "text/x-csv",
    "text/plain",
    "application/csv",
    "application/x-csv",
    "application/vnd.ms-excel",
    "application/octet-stream",
];

/// A file picked by the user (drag/drop or browse), held in memory.
#[derive(Clone, PartialEq, Eq)]
pub struct SelectedFile {
    /// Original file name, including extension.
    pub name: String,
    /// MIME type reported by the picker, if any.
    pub content_type: Option<String>,
    /// Raw file contents.
    pub bytes: Vec<u8>,
}

impl fmt::Debug for SelectedFile {
    // Contents are customer data and never printed.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectedFile")
            .field("name", &self.name)
            .field("content_type", &self.content_type)
            .field("size_bytes", &self.bytes.len())
            .finish()
    }
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, content_type: Option<&str>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.map(str::to_string),
            bytes,
        }
    }

    /// Reads a file from disk. The content type is inferred from the extension.
    ///
    /// Files over `max_bytes` are rejected from their metadata, and reading
    /// never buffers more than `max_bytes + 1` bytes.
    ///
    /// # Errors
    ///
    /// `AppError::FileRejected` for an oversized file, `AppError::Internal`
    /// when the file cannot be read.
    pub async fn from_path(path: &Path, max_bytes: u64) -> Result<Self, AppError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "upload.csv".to_string());

        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to read file: {}", e)))?;
        if metadata.len() > max_bytes {
            return Err(AppError::FileRejected(oversized(&name, metadata.len(), max_bytes)));
        }

        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to read file: {}", e)))?;
        let mut bytes = Vec::with_capacity(metadata.len() as usize);
        file.take(max_bytes.saturating_add(1))
            .read_to_end(&mut bytes)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to read file: {}", e)))?;

        // Grew after the metadata check.
        if bytes.len() as u64 > max_bytes {
            return Err(AppError::FileRejected(oversized(&name, bytes.len() as u64, max_bytes)));
        }

        let content_type = if has_csv_extension(&name) {
            Some("text/csv")
        } else {
            None
        };

        Ok(Self::new(name, content_type, bytes))
    }

    /// Size of the file in bytes.
    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Why the upload stage refused a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FileRejection {
    /// Extension or MIME type is not CSV.
    NotCsv { file_name: String },
    /// File exceeds the configured size limit.
    TooLarge { size_bytes: u64, max_bytes: u64 },
    /// File has no content.
    Empty { file_name: String },
    /// More than one file was dropped at once.
    MultipleFiles { count: usize },
}

impl FileRejection {
    /// Message shown under the drop zone.
    pub fn message(&self) -> String {
        match self {
            FileRejection::NotCsv { .. } => "Only CSV files are accepted".to_string(),
            FileRejection::TooLarge { max_bytes, .. } => {
                format!("File exceeds the {} limit", format_size(*max_bytes))
            }
            FileRejection::Empty { .. } => "The selected file is empty".to_string(),
            FileRejection::MultipleFiles { .. } => "Please upload a single CSV file".to_string(),
        }
    }
}

impl fmt::Display for FileRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

/// Picks the single file out of a drop or browse selection.
///
/// Returns `Ok(None)` when the selection is empty.
pub fn accept_selection(
    mut files: Vec<SelectedFile>,
    max_bytes: u64,
) -> Result<Option<SelectedFile>, FileRejection> {
    if files.len() > 1 {
        return Err(FileRejection::MultipleFiles { count: files.len() });
    }

    match files.pop() {
        Some(file) => {
            check_file(&file, max_bytes)?;
            Ok(Some(file))
        }
        None => Ok(None),
    }
}

/// Checks type, size and emptiness, in that order.
pub fn check_file(file: &SelectedFile, max_bytes: u64) -> Result<(), FileRejection> {
    if !is_csv(file) {
        return Err(FileRejection::NotCsv {
            file_name: file.name.clone(),
        });
    }

    let size_bytes = file.size_bytes();
    if size_bytes > max_bytes {
        return Err(FileRejection::TooLarge {
            size_bytes,
            max_bytes,
        });
    }

    if size_bytes == 0 {
        return Err(FileRejection::Empty {
            file_name: file.name.clone(),
        });
    }

    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Internal Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn is_csv(file: &SelectedFile) -> bool {
    if !has_csv_extension(&file.name) {
        return false;
    }

    match file.content_type.as_deref() {
        None => true,
        Some(mime) => {
            // Drop parameters such as "; charset=utf-8".
            let essence = mime
                .split(';')
                .next()
                .unwrap_or("")
                .trim()
                .to_ascii_lowercase();
            essence.is_empty() || CSV_MIME_TYPES.contains(&essence.as_str())
        }
    }
}

/// Rejection for a file known to exceed the limit. Type still wins over size.
fn oversized(name: &str, size_bytes: u64, max_bytes: u64) -> FileRejection {
    if has_csv_extension(name) {
        FileRejection::TooLarge {
            size_bytes,
            max_bytes,
        }
    } else {
        FileRejection::NotCsv {
            file_name: name.to_string(),
        }
    }
}

fn has_csv_extension(name: &str) -> bool {
    Path::new(name)
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false)
}

/// Formats a byte count using binary units ("5 MB" for 5 MiB).
fn format_size(bytes: u64) -> String {
    const MIB: u64 = 1024 * 1024;
    const KIB: u64 = 1024;

    if bytes >= MIB && bytes % MIB == 0 {
        format!("{} MB", bytes / MIB)
    } else if bytes >= MIB {
        format!("{:.1} MB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{} KB", bytes / KIB)
    } else {
        format!("{} bytes", bytes)
    }
}
