//! Client configuration for the import wizard.
//!
//! All fields have defaults matching the salon admin API; hosts override them
//! with the `with_*` builders or load them from the environment.

use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use crate::error::AppError;

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Default path of the customer import resource.
pub const DEFAULT_IMPORT_PATH: &str = "/api/customers/import";

/// Largest file the upload stage accepts (5 MiB).
pub const DEFAULT_MAX_FILE_BYTES: u64 = 5 * 1024 * 1024;

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Pause between a successful import and the summary stage.
const DEFAULT_SUMMARY_DELAY: Duration = Duration::from_secs(1);

/// Columns of the downloadable customer template.
pub const TEMPLATE_COLUMNS: &[&str] = &[
    "first_name",
    "last_name",
    "email",
    "phone",
    "pet_name",
    "pet_breed",
];

// ─────────────────────────────────────────────────────────────────────────────
// ProgressConfig
// ─────────────────────────────────────────────────────────────────────────────

/// Tuning for the synthetic progress indicator shown while an import runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressConfig {
    /// Time between increments.
    pub interval: Duration,
    /// Percentage points added per increment.
    pub step: u8,
    /// Highest value reached before the server responds.
    pub cap: u8,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(500),
            step: 10,
            cap: 90,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ClientConfig
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration shared by the API client and the wizard controller.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the salon admin API (e.g. `https://salon.example.com`).
    pub base_url: Url,
    /// Path of the import resource, joined onto `base_url`.
    pub import_path: String,
    /// Bearer token for the admin API, if the deployment requires one.
    pub api_token: Option<SecretString>,
    /// Upper bound for every request. `None` waits indefinitely.
    pub request_timeout: Option<Duration>,
    /// Largest accepted upload in bytes.
    pub max_file_bytes: u64,
    /// Delay between import success and the summary stage.
    pub summary_delay: Duration,
    /// Synthetic progress tuning.
    pub progress: ProgressConfig,
    /// Initial value of the "send notifications" option on new sessions.
    pub send_notifications: bool,
    /// Columns the preflight expects to find in the header row.
    pub expected_columns: Vec<String>,
}

impl ClientConfig {
    /// Creates a configuration with defaults for the given API base URL.
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            import_path: DEFAULT_IMPORT_PATH.to_string(),
            api_token: None,
            request_timeout: Some(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            summary_delay: DEFAULT_SUMMARY_DELAY,
            progress: ProgressConfig::default(),
            send_notifications: false,
            expected_columns: TEMPLATE_COLUMNS.iter().map(|c| c.to_string()).collect(),
        }
    }

    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                       | Default                   |
    /// |-------------------------------|---------------------------|
    /// | `SALON_API_URL`               | required                  |
    /// | `SALON_API_TOKEN`             | none                      |
    /// | `SALON_IMPORT_PATH`           | `/api/customers/import`   |
    /// | `SALON_REQUEST_TIMEOUT_SECS`  | `300` (`0` disables)      |
    /// | `SALON_MAX_UPLOAD_BYTES`      | `5242880`                 |
    pub fn from_env() -> Result<Self, AppError> {
        let raw_url = std::env::var("SALON_API_URL")
            .map_err(|_| AppError::Internal("SALON_API_URL is not set".to_string()))?;
        let base_url = Url::parse(&raw_url)
            .map_err(|e| AppError::Internal(format!("SALON_API_URL is invalid: {}", e)))?;

        let mut config = Self::new(base_url);

        if let Ok(token) = std::env::var("SALON_API_TOKEN") {
            if !token.trim().is_empty() {
                config.api_token = Some(SecretString::from(token));
            }
        }

        if let Ok(path) = std::env::var("SALON_IMPORT_PATH") {
            config.import_path = path;
        }

        if let Ok(raw) = std::env::var("SALON_REQUEST_TIMEOUT_SECS") {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                AppError::Internal("SALON_REQUEST_TIMEOUT_SECS must be a valid u64".to_string())
            })?;
            config.request_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }

        if let Ok(raw) = std::env::var("SALON_MAX_UPLOAD_BYTES") {
            config.max_file_bytes = raw.trim().parse().map_err(|_| {
                AppError::Internal("SALON_MAX_UPLOAD_BYTES must be a valid u64".to_string())
            })?;
        }

        Ok(config)
    }

    pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(SecretString::from(token.into()));
        self
    }

    pub fn with_import_path(mut self, path: impl Into<String>) -> Self {
        self.import_path = path.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_summary_delay(mut self, delay: Duration) -> Self {
        self.summary_delay = delay;
        self
    }

    pub fn with_progress(mut self, progress: ProgressConfig) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_send_notifications(mut self, send: bool) -> Self {
        self.send_notifications = send;
        self
    }

    pub fn with_max_file_bytes(mut self, max: u64) -> Self {
        self.max_file_bytes = max;
        self
    }

    /// Builds the URL of an import endpoint. `suffix` is `""`, `"validate"`
    /// or `"template"`.
    pub fn endpoint(&self, suffix: &str) -> Result<Url, AppError> {
        let base_path = self.import_path.trim_end_matches('/');
        let path = if suffix.is_empty() {
            base_path.to_string()
        } else {
            format!("{}/{}", base_path, suffix)
        };

        self.base_url
            .join(&path)
            .map_err(|_| AppError::Internal(format!("Invalid path: {}", path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ClientConfig {
        ClientConfig::new(Url::parse("https://salon.example.com").unwrap())
    }

    #[test]
    fn defaults_match_wizard_contract() {
        let config = config();

        assert_eq!(config.max_file_bytes, 5 * 1024 * 1024);
        assert_eq!(config.summary_delay, Duration::from_secs(1));
        assert_eq!(config.progress.cap, 90);
        assert!(!config.send_notifications);
        assert!(config.api_token.is_none());
        assert_eq!(config.expected_columns.len(), TEMPLATE_COLUMNS.len());
    }

    #[test]
    fn endpoint_builds_import_urls() {
        let config = config();

        assert_eq!(
            config.endpoint("").unwrap().as_str(),
            "https://salon.example.com/api/customers/import"
        );
        assert_eq!(
            config.endpoint("validate").unwrap().as_str(),
            "https://salon.example.com/api/customers/import/validate"
        );
        assert_eq!(
            config.endpoint("template").unwrap().as_str(),
            "https://salon.example.com/api/customers/import/template"
        );
    }

    #[test]
    fn endpoint_tolerates_trailing_slash() {
        let config = config().with_import_path("/api/v2/clients/import/");

        assert_eq!(
            config.endpoint("validate").unwrap().as_str(),
            "https://salon.example.com/api/v2/clients/import/validate"
        );
    }

    #[test]
    fn debug_output_hides_token() {
        let config = config().with_api_token("super_secret_token_12345");

        let debug_output = format!("{:?}", config);

        assert!(!debug_output.contains("super_secret_token_12345"));
    }

    #[test]
    fn builders_override_defaults() {
        let config = config()
            .with_request_timeout(None)
            .with_summary_delay(Duration::ZERO)
            .with_send_notifications(true)
            .with_max_file_bytes(1024);

        assert!(config.request_timeout.is_none());
        assert_eq!(config.summary_delay, Duration::ZERO);
        assert!(config.send_notifications);
        assert_eq!(config.max_file_bytes, 1024);
    }
}
