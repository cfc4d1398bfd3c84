//! Client-side checks on the selected file.
//!
//! `file_check` decides whether the upload stage accepts a file at all;
//! `csv_preflight` reports advisory findings on accepted files. Row-level
//! validation is done by the server.

pub mod csv_preflight;
pub mod file_check;

pub use csv_preflight::{preflight, LineEndings, PreflightReport, PreflightWarning};
pub use file_check::{accept_selection, check_file, FileRejection, SelectedFile};
