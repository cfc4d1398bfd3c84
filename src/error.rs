use serde::Serialize;
use thiserror::Error;

use crate::validation::FileRejection;

/// Patterns (lowercase) that indicate sensitive data not safe for UI display.
/// Used by `contains_sensitive()` for case-insensitive matching.
pub(crate) const SENSITIVE_PATTERNS: &[&str] = &[
    "bearer ",
    "api_token",
    "access_token",
    "authorization:",
    "set-cookie",
];

/// Returns true if the message contains any sensitive pattern (case-insensitive).
fn contains_sensitive(msg: &str) -> bool {
    let lower = msg.to_ascii_lowercase();
    SENSITIVE_PATTERNS.iter().any(|p| lower.contains(p))
}

/// Sanitizes a message for UI display.
/// If sensitive content is detected, returns the fallback instead.
fn sanitize_message(msg: &str, fallback: &str) -> String {
    if contains_sensitive(msg) {
        fallback.into()
    } else {
        msg.to_string()
    }
}

/// User-friendly error presentation for the frontend.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorPresentation {
    pub title: String,
    pub message: String,
    pub action: Option<String>,
}

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum AppError {
    // ── Upload ────────────────────────────────────────────────────────────────
    #[error("File rejected: {0}")]
    FileRejected(FileRejection),

    #[error("No file selected")]
    NoFileSelected,

    // ── Server verdicts ───────────────────────────────────────────────────────
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Import failed: {0}")]
    ImportFailed(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Unexpected response: {0}")]
    InvalidResponse(String),

    // ── Network ───────────────────────────────────────────────────────────────
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timed out")]
    Timeout,

    // ── Wizard ────────────────────────────────────────────────────────────────
    #[error("Cannot apply {event} while in the {from} stage")]
    InvalidTransition {
        from: &'static str,
        event: &'static str,
    },

    // ── Generic fallback ──────────────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Converts the error into a user-friendly presentation suitable for UI display.
    /// Never leaks tokens or authorization headers.
    pub fn to_presentation(&self) -> ErrorPresentation {
        match self {
            // ── Upload ────────────────────────────────────────────────────────
            AppError::FileRejected(rejection) => ErrorPresentation {
                title: "File Not Accepted".into(),
                message: rejection.message(),
                action: Some("Choose a different file".into()),
            },

            AppError::NoFileSelected => ErrorPresentation {
                title: "No File Selected".into(),
                message: "Select a CSV file before continuing.".into(),
                action: Some("Choose a CSV file".into()),
            },

            // ── Server verdicts ───────────────────────────────────────────────
            AppError::ValidationFailed(msg) => ErrorPresentation {
                title: "Validation Failed".into(),
                message: sanitize_message(msg, "The file could not be validated."),
                action: Some("Fix the file and upload it again".into()),
            },

            AppError::ImportFailed(msg) => ErrorPresentation {
                title: "Import Failed".into(),
                message: sanitize_message(msg, "The import could not be completed."),
                action: Some("Review the file and try again".into()),
            },

            AppError::Api { status, message } => ErrorPresentation {
                title: "Server Error".into(),
                message: sanitize_message(
                    message,
                    &format!("The server responded with status {}.", status),
                ),
                action: Some("Try again".into()),
            },

            AppError::RateLimited { retry_after_secs } => {
                let wait_msg = match retry_after_secs {
                    Some(secs) => format!("Please wait {} seconds before trying again.", secs),
                    None => "Please wait a moment before trying again.".into(),
                };
                ErrorPresentation {
                    title: "Too Many Requests".into(),
                    message: format!("The server is limiting requests. {}", wait_msg),
                    action: Some("Wait and retry".into()),
                }
            }

            AppError::NotAuthenticated => ErrorPresentation {
                title: "Not Signed In".into(),
                message: "Your session is not authorized to import customers.".into(),
                action: Some("Sign in again".into()),
            },

            AppError::InvalidResponse(_) => ErrorPresentation {
                title: "Unexpected Response".into(),
                message: "The server sent a response the wizard could not understand.".into(),
                action: Some("Try again".into()),
            },

            // ── Network ───────────────────────────────────────────────────────
            AppError::ConnectionFailed(_) => ErrorPresentation {
                title: "Connection Failed".into(),
                message: "Could not reach the salon server. Please check your connection.".into(),
                action: Some("Check network and retry".into()),
            },

            AppError::Timeout => ErrorPresentation {
                title: "Request Timed Out".into(),
                message: "The server took too long to respond.".into(),
                action: Some("Retry the upload".into()),
            },

            // ── Wizard ────────────────────────────────────────────────────────
            AppError::InvalidTransition { .. } => ErrorPresentation {
                title: "Action Not Available".into(),
                message: "That action is not available at this step of the import.".into(),
                action: None,
            },

            // ── Generic ───────────────────────────────────────────────────────
            AppError::Internal(_) => ErrorPresentation {
                title: "Unexpected Error".into(),
                message: "Something went wrong. Please try again.".into(),
                action: Some("Try again".into()),
            },
        }
    }

    /// Message stored on the session when a stage fails.
    pub fn user_message(&self) -> String {
        self.to_presentation().message
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        // The raw error may contain the full URL; keep only its category.
        if err.is_timeout() {
            AppError::Timeout
        } else if err.is_decode() {
            AppError::InvalidResponse("Response body could not be decoded".to_string())
        } else {
            AppError::ConnectionFailed("Connection to the salon server failed".to_string())
        }
    }
}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_presentation().serialize(serializer)
    }
}
