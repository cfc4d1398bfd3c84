//! HTTP client for the salon admin import endpoints, with safe logging.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::multipart::{Form, Part};
use secrecy::ExposeSecret;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use url::Url;

use crate::api::types::{ApiErrorBody, DuplicateStrategy, ImportResult, ValidationResult};
use crate::config::ClientConfig;
use crate::error::AppError;
use crate::validation::SelectedFile;

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// User agent string for all admin API requests.
const CLIENT_USER_AGENT: &str = "SalonImport/0.1.0";

/// Query keys whose values never reach the logs. Besides credentials this
/// covers customer contact fields, which lookup and template filters carry.
const REDACTED_QUERY_KEYS: &[&str] = &[
    "access_token",
    "api_token",
    "token",
    "key",
    "session",
    "authorization",
    "signature",
    "email",
    "phone",
];

// ─────────────────────────────────────────────────────────────────────────────
// LoggingMode
// ─────────────────────────────────────────────────────────────────────────────

/// Controls how URLs are sanitized for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoggingMode {
    /// Log only the path component.
    /// Example: `/api/customers/import/validate`
    #[default]
    PathOnly,

    /// Log path and query parameters, but redact sensitive values.
    /// Example: `/api/customers/import?token=***&dry_run=true`
    PathAndQueryRedacted,
}

// ─────────────────────────────────────────────────────────────────────────────
// URL Sanitization
// ─────────────────────────────────────────────────────────────────────────────

/// Exact key matches (case-insensitive), plus any `*_token` or `*_secret`.
fn redacts_query_value(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    REDACTED_QUERY_KEYS.contains(&key.as_str())
        || key.ends_with("_token")
        || key.ends_with("_secret")
}

/// Renders `url` for a log line: the path, plus the query with redacted
/// values in `PathAndQueryRedacted` mode. Scheme, host and fragment are
/// always dropped.
pub fn sanitize_url_for_logs(url: &Url, mode: LoggingMode) -> String {
    let path = url.path();
    if mode == LoggingMode::PathOnly {
        return path.to_string();
    }

    let query = url
        .query_pairs()
        .map(|(key, value)| {
            let shown = if redacts_query_value(&key) {
                "***"
            } else {
                value.as_ref()
            };
            format!("{}={}", key, shown)
        })
        .collect::<Vec<_>>()
        .join("&");

    if query.is_empty() {
        path.to_string()
    } else {
        format!("{}?{}", path, query)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Endpoint
// ─────────────────────────────────────────────────────────────────────────────

/// The three import endpoints. Each maps failures to its own error variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endpoint {
    Template,
    Validate,
    Import,
}

impl Endpoint {
    fn suffix(&self) -> &'static str {
        match self {
            Endpoint::Template => "template",
            Endpoint::Validate => "validate",
            Endpoint::Import => "",
        }
    }

    fn failure(&self, status: reqwest::StatusCode, message: String) -> AppError {
        match self {
            Endpoint::Template => AppError::Api {
                status: status.as_u16(),
                message,
            },
            Endpoint::Validate => AppError::ValidationFailed(message),
            Endpoint::Import => AppError::ImportFailed(message),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ImportApiClient
// ─────────────────────────────────────────────────────────────────────────────

/// HTTP client for the customer import resource.
///
/// Cheap to clone; clones share the connection pool and configuration.
#[derive(Clone)]
pub struct ImportApiClient {
    http: reqwest::Client,
    config: Arc<ClientConfig>,
    logging_mode: LoggingMode,
}

impl std::fmt::Debug for ImportApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImportApiClient")
            .field("base_url", &self.config.base_url.as_str())
            .field("import_path", &self.config.import_path)
            .field("logging_mode", &self.logging_mode)
            .finish()
    }
}

impl ImportApiClient {
    /// Creates a client for the configured API.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Internal` if the HTTP client fails to initialize.
    pub fn new(config: ClientConfig) -> Result<Self, AppError> {
        let http = build_http_client(&config)?;
        Ok(Self {
            http,
            config: Arc::new(config),
            logging_mode: LoggingMode::default(),
        })
    }

    /// Updates the logging mode for URL sanitization.
    pub fn with_logging_mode(mut self, mode: LoggingMode) -> Self {
        self.logging_mode = mode;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Fetches the blank customer template as raw CSV bytes.
    pub async fn download_template(&self) -> Result<Vec<u8>, AppError> {
        let url = self.config.endpoint(Endpoint::Template.suffix())?;
        let request = self.authorize(self.http.get(url.as_str()));

        let response = self.execute_with_logging("GET", request, &url).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(self
                .parse_error_response(response, status, Endpoint::Template)
                .await);
        }

        let bytes = response.bytes().await.map_err(AppError::from)?;
        Ok(bytes.to_vec())
    }

    /// Downloads the template to `output_path` using an atomic write.
    ///
    /// Returns the number of bytes written.
    pub async fn save_template(&self, output_path: &Path) -> Result<u64, AppError> {
        let url = self.config.endpoint(Endpoint::Template.suffix())?;
        let request = self.authorize(self.http.get(url.as_str()));

        let response = self.execute_with_logging("GET", request, &url).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(self
                .parse_error_response(response, status, Endpoint::Template)
                .await);
        }

        if let Some(parent) = output_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    AppError::Internal(format!("Failed to create output directory: {}", e))
                })?;
            }
        }

        // Temp file in the same directory so persist() is a rename.
        let parent_dir = output_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let temp_file = tempfile::NamedTempFile::new_in(parent_dir)
            .map_err(|e| AppError::Internal(format!("Failed to create temp file: {}", e)))?;

        let std_file = temp_file
            .reopen()
            .map_err(|e| AppError::Internal(format!("Failed to reopen temp file: {}", e)))?;
        let mut async_file = File::from_std(std_file);

        let mut stream = response.bytes_stream();
        let mut total_bytes = 0u64;

        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result.map_err(AppError::from)?;
            async_file
                .write_all(&chunk)
                .await
                .map_err(|e| AppError::Internal(format!("Error writing to file: {}", e)))?;
            total_bytes += chunk.len() as u64;
        }

        async_file
            .flush()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to flush output file: {}", e)))?;
        async_file
            .sync_all()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to sync output file: {}", e)))?;

        temp_file
            .persist(output_path)
            .map_err(|e| AppError::Internal(format!("Failed to persist temp file: {}", e)))?;

        info!("[IMPORT-API] Template saved: {} bytes", total_bytes);
        Ok(total_bytes)
    }

    /// Uploads the file for server-side validation and duplicate detection.
    ///
    /// # Errors
    ///
    /// - `AppError::ValidationFailed` - the server rejected the file
    /// - `AppError::InvalidResponse` - the success body could not be parsed
    /// - `AppError::Timeout` / `AppError::ConnectionFailed` - network error
    pub async fn validate_file(&self, file: &SelectedFile) -> Result<ValidationResult, AppError> {
        let url = self.config.endpoint(Endpoint::Validate.suffix())?;
        let form = Form::new().part("file", file_part(file)?);

        info!(
            "[IMPORT-API] POST {} ({} bytes)",
            sanitize_url_for_logs(&url, self.logging_mode),
            file.size_bytes()
        );

        let request = self.authorize(self.http.post(url.as_str())).multipart(form);
        let response = self.execute_with_logging("POST", request, &url).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(self
                .parse_error_response(response, status, Endpoint::Validate)
                .await);
        }

        let result: ValidationResult = response.json().await.map_err(|e| {
            AppError::InvalidResponse(format!("Failed to parse validation response: {}", e))
        })?;

        info!(
            "[IMPORT-API] Validation: {} rows, {} valid, {} duplicates",
            result.total_rows, result.valid_rows, result.duplicates_found
        );
        Ok(result)
    }

    /// Submits the file for import with one duplicate policy for all matches.
    ///
    /// # Errors
    ///
    /// - `AppError::ImportFailed` - the server rejected the import
    /// - `AppError::InvalidResponse` - the body is malformed or its counts
    ///   exceed the rows in the file
    /// - `AppError::Timeout` / `AppError::ConnectionFailed` - network error
    pub async fn import_file(
        &self,
        file: &SelectedFile,
        strategy: DuplicateStrategy,
        send_notifications: bool,
    ) -> Result<ImportResult, AppError> {
        let url = self.config.endpoint(Endpoint::Import.suffix())?;
        let form = Form::new()
            .part("file", file_part(file)?)
            .text("duplicate_strategy", strategy.as_str())
            .text(
                "send_notifications",
                if send_notifications { "true" } else { "false" },
            );

        info!(
            "[IMPORT-API] POST {} ({} bytes, strategy={})",
            sanitize_url_for_logs(&url, self.logging_mode),
            file.size_bytes(),
            strategy.as_str()
        );

        let request = self.authorize(self.http.post(url.as_str())).multipart(form);
        let response = self.execute_with_logging("POST", request, &url).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(self
                .parse_error_response(response, status, Endpoint::Import)
                .await);
        }

        let result: ImportResult = response.json().await.map_err(|e| {
            AppError::InvalidResponse(format!("Failed to parse import response: {}", e))
        })?;

        if !result.is_consistent() {
            warn!(
                "[IMPORT-API] Inconsistent import counts: total={} created={} failed={}",
                result.total_rows, result.created_count, result.failed_count
            );
            return Err(AppError::InvalidResponse(
                "Import counts exceed the number of rows".to_string(),
            ));
        }

        info!(
            "[IMPORT-API] Import complete: {} created, {} updated, {} skipped, {} failed",
            result.created_count, result.updated_count, result.skipped_count, result.failed_count
        );
        Ok(result)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Private Helpers
    // ─────────────────────────────────────────────────────────────────────────

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_token {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        }
    }

    /// Executes a request with timing and logging.
    ///
    /// Never logs the Authorization header or bodies. Errors never carry the
    /// raw URL.
    async fn execute_with_logging(
        &self,
        method: &str,
        request: reqwest::RequestBuilder,
        url: &Url,
    ) -> Result<reqwest::Response, AppError> {
        let start = Instant::now();
        let sanitized_url = sanitize_url_for_logs(url, self.logging_mode);

        let result = request.send().await;
        let duration_ms = start.elapsed().as_millis();

        match result {
            Ok(response) => {
                let x_request_id = response
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");

                info!(
                    "[IMPORT-API] {} {} {} {}ms {}",
                    method,
                    sanitized_url,
                    response.status().as_u16(),
                    duration_ms,
                    x_request_id
                );

                Ok(response)
            }
            Err(e) => {
                let error = AppError::from(e);
                info!(
                    "[IMPORT-API] {} {} FAILED {}ms ({})",
                    method, sanitized_url, duration_ms, error
                );
                Err(error)
            }
        }
    }

    /// Parses an error response and maps it to the endpoint's AppError.
    async fn parse_error_response(
        &self,
        response: reqwest::Response,
        status: reqwest::StatusCode,
        endpoint: Endpoint,
    ) -> AppError {
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok());
            return AppError::RateLimited {
                retry_after_secs: retry_after,
            };
        }

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return AppError::NotAuthenticated;
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&body)
            .ok()
            .and_then(ApiErrorBody::into_message)
            .unwrap_or_else(|| {
                format!(
                    "HTTP {} - {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("Unknown error")
                )
            });

        endpoint.failure(status, message)
    }
}

/// Builds the multipart part carrying the CSV file.
fn file_part(file: &SelectedFile) -> Result<Part, AppError> {
    Part::bytes(file.bytes.clone())
        .file_name(file.name.clone())
        .mime_str("text/csv")
        .map_err(|e| AppError::Internal(format!("Failed to build upload part: {}", e)))
}

/// Builds the configured HTTP client.
fn build_http_client(config: &ClientConfig) -> Result<reqwest::Client, AppError> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));

    let mut builder = reqwest::Client::builder().default_headers(headers);
    if let Some(timeout) = config.request_timeout {
        builder = builder.timeout(timeout);
    }

    builder
        .build()
        .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
