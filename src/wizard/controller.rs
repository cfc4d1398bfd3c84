//! Import wizard controller.
//!
//! Owns the `ImportSession` and runs the requests each stage needs. Hosts
//! call the async methods below in response to user actions and render
//! `view()`; they never touch the session directly.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::client::ImportApiClient;
use crate::api::types::{DuplicateStrategy, ImportResult, ValidationResult};
use crate::config::ClientConfig;
use crate::error::AppError;
use crate::validation::{accept_selection, preflight, FileRejection, SelectedFile};
use crate::wizard::progress::{
    ImportProgress, ProgressPublisher, ProgressSource, ProgressTask, SyntheticProgress,
};
use crate::wizard::session::{ImportSession, Submission};
use crate::wizard::stage::ImportStage;
use crate::wizard::view::{render, WizardView};

// ─────────────────────────────────────────────────────────────────────────────
// Traits for Testing
// ─────────────────────────────────────────────────────────────────────────────

/// The HTTP calls the wizard makes.
pub trait ImportApi: Send + Sync {
    fn validate_file<'a>(
        &'a self,
        file: &'a SelectedFile,
    ) -> Pin<Box<dyn Future<Output = Result<ValidationResult, AppError>> + Send + 'a>>;

    fn import_file<'a>(
        &'a self,
        file: &'a SelectedFile,
        strategy: DuplicateStrategy,
        send_notifications: bool,
    ) -> Pin<Box<dyn Future<Output = Result<ImportResult, AppError>> + Send + 'a>>;

    fn save_template<'a>(
        &'a self,
        output_path: &'a Path,
    ) -> Pin<Box<dyn Future<Output = Result<u64, AppError>> + Send + 'a>>;
}

impl ImportApi for ImportApiClient {
    fn validate_file<'a>(
        &'a self,
        file: &'a SelectedFile,
    ) -> Pin<Box<dyn Future<Output = Result<ValidationResult, AppError>> + Send + 'a>> {
        Box::pin(ImportApiClient::validate_file(self, file))
    }

    fn import_file<'a>(
        &'a self,
        file: &'a SelectedFile,
        strategy: DuplicateStrategy,
        send_notifications: bool,
    ) -> Pin<Box<dyn Future<Output = Result<ImportResult, AppError>> + Send + 'a>> {
        Box::pin(ImportApiClient::import_file(
            self,
            file,
            strategy,
            send_notifications,
        ))
    }

    fn save_template<'a>(
        &'a self,
        output_path: &'a Path,
    ) -> Pin<Box<dyn Future<Output = Result<u64, AppError>> + Send + 'a>> {
        Box::pin(ImportApiClient::save_template(self, output_path))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ImportController
// ─────────────────────────────────────────────────────────────────────────────

/// Outcome of `start_import`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportStart {
    /// This call sent the request and saw it through.
    Submitted,
    /// A request for this stage entry was already sent; nothing was done.
    AlreadyRunning,
}

/// Host callback run after "Done" on the summary stage.
pub type SuccessCallback = Arc<dyn Fn() + Send + Sync>;

pub struct ImportController<A: ImportApi> {
    api: Arc<A>,
    session: Arc<Mutex<ImportSession>>,
    progress: ProgressPublisher,
    progress_source: Arc<dyn ProgressSource>,
    /// Parent token of the current session's progress tickers. `close()`
    /// cancels it and installs a fresh one.
    run_scope: Arc<Mutex<CancellationToken>>,
    on_success: Option<SuccessCallback>,
    max_file_bytes: u64,
    expected_columns: Arc<Vec<String>>,
    summary_delay: Duration,
}

impl<A: ImportApi> Clone for ImportController<A> {
    fn clone(&self) -> Self {
        Self {
            api: self.api.clone(),
            session: self.session.clone(),
            progress: self.progress.clone(),
            progress_source: self.progress_source.clone(),
            run_scope: self.run_scope.clone(),
            on_success: self.on_success.clone(),
            max_file_bytes: self.max_file_bytes,
            expected_columns: self.expected_columns.clone(),
            summary_delay: self.summary_delay,
        }
    }
}

impl ImportController<ImportApiClient> {
    /// Builds the HTTP client and a controller around it.
    pub fn from_config(config: ClientConfig) -> Result<Self, AppError> {
        let client = ImportApiClient::new(config.clone())?;
        Ok(Self::new(client, &config))
    }
}

impl<A: ImportApi + 'static> ImportController<A> {
    pub fn new(api: A, config: &ClientConfig) -> Self {
        Self {
            api: Arc::new(api),
            session: Arc::new(Mutex::new(ImportSession::new(config.send_notifications))),
            progress: ProgressPublisher::new(),
            progress_source: Arc::new(SyntheticProgress::new(config.progress)),
            run_scope: Arc::new(Mutex::new(CancellationToken::new())),
            on_success: None,
            max_file_bytes: config.max_file_bytes,
            expected_columns: Arc::new(config.expected_columns.clone()),
            summary_delay: config.summary_delay,
        }
    }

    pub fn with_on_success(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_success = Some(Arc::new(callback));
        self
    }

    /// Replaces the synthetic ticker, e.g. with server-reported progress.
    pub fn with_progress_source(mut self, source: impl ProgressSource + 'static) -> Self {
        self.progress_source = Arc::new(source);
        self
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Read Side
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn view(&self) -> WizardView {
        let session = self.session.lock().await;
        render(&session, self.progress.current())
    }

    pub async fn stage(&self) -> ImportStage {
        self.session.lock().await.stage
    }

    /// Copy of the session for inspection.
    pub async fn snapshot(&self) -> ImportSession {
        self.session.lock().await.clone()
    }

    pub fn subscribe_progress(&self) -> watch::Receiver<ImportProgress> {
        self.progress.subscribe()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Upload
    // ─────────────────────────────────────────────────────────────────────────

    /// Handles a drop or browse selection. Nothing is sent to the server.
    ///
    /// # Errors
    ///
    /// `AppError::FileRejected` when the selection is not a single CSV file
    /// within the size limit. The rejection is also stored for the view.
    pub async fn select_files(&self, files: Vec<SelectedFile>) -> Result<(), AppError> {
        match accept_selection(files, self.max_file_bytes) {
            Ok(Some(file)) => {
                let report = preflight(&file.bytes, &self.expected_columns);
                info!(
                    "[IMPORT-WIZARD] File accepted: {} bytes, {} preflight warnings",
                    file.size_bytes(),
                    report.warnings.len()
                );
                self.session.lock().await.accept_file(file, report)
            }
            Ok(None) => Ok(()),
            Err(rejection) => self.reject(rejection).await,
        }
    }

    pub async fn select_file(&self, file: SelectedFile) -> Result<(), AppError> {
        self.select_files(vec![file]).await
    }

    /// Browse selection from disk. Oversized files are refused without
    /// being read.
    pub async fn select_path(&self, path: &Path) -> Result<(), AppError> {
        match SelectedFile::from_path(path, self.max_file_bytes).await {
            Ok(file) => self.select_file(file).await,
            Err(AppError::FileRejected(rejection)) => self.reject(rejection).await,
            Err(e) => Err(e),
        }
    }

    async fn reject(&self, rejection: FileRejection) -> Result<(), AppError> {
        info!("[IMPORT-WIZARD] File rejected: {:?}", rejection);
        self.session.lock().await.reject_file(rejection.clone())?;
        Err(AppError::FileRejected(rejection))
    }

    pub async fn clear_file(&self) -> Result<(), AppError> {
        self.session.lock().await.clear_file()
    }

    pub async fn set_send_notifications(&self, send: bool) -> Result<(), AppError> {
        let mut session = self.session.lock().await;
        if session.stage.is_busy() {
            return Err(AppError::InvalidTransition {
                from: session.stage.as_str(),
                event: "set_send_notifications",
            });
        }
        session.send_notifications = send;
        Ok(())
    }

    /// Saves the blank template. Independent of the wizard stage.
    pub async fn download_template(&self, output_path: &Path) -> Result<u64, AppError> {
        self.api.save_template(output_path).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Validation
    // ─────────────────────────────────────────────────────────────────────────

    /// "Validate & Continue". Returns the stage the wizard lands on.
    ///
    /// The request runs on its own task, so dropping this future does not
    /// strand the session in Validating.
    ///
    /// # Errors
    ///
    /// The request error, after the session has returned to Upload with the
    /// message stored.
    pub async fn validate(&self) -> Result<ImportStage, AppError> {
        let (file, session_id) = {
            let mut session = self.session.lock().await;
            let file = session.begin_validation()?;
            (file, session.id)
        };

        let this = self.clone();
        join_request(tokio::spawn(async move {
            this.run_validation(file, session_id).await
        }))
        .await
    }

    async fn run_validation(
        &self,
        file: SelectedFile,
        session_id: Uuid,
    ) -> Result<ImportStage, AppError> {
        let result = self.api.validate_file(&file).await;

        let mut session = self.session.lock().await;
        if session.id != session_id {
            info!("[IMPORT-WIZARD] Session reset during validation, dropping response");
            return Ok(session.stage);
        }

        match result {
            Ok(validation) => {
                let stage = session.complete_validation(validation)?;
                info!("[IMPORT-WIZARD] Validation complete -> {}", stage);
                Ok(stage)
            }
            Err(e) => {
                warn!("[IMPORT-WIZARD] Validation failed: {}", e);
                session.fail_validation(e.user_message())?;
                Err(e)
            }
        }
    }

    /// Back from Review or Duplicates to Upload.
    pub async fn back(&self) -> Result<ImportStage, AppError> {
        self.session.lock().await.back()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Duplicates
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn select_strategy(&self, strategy: DuplicateStrategy) -> Result<(), AppError> {
        self.session.lock().await.select_strategy(strategy)
    }

    pub async fn next_duplicate(&self) -> Result<usize, AppError> {
        self.session.lock().await.next_duplicate()
    }

    pub async fn previous_duplicate(&self) -> Result<usize, AppError> {
        self.session.lock().await.previous_duplicate()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Import
    // ─────────────────────────────────────────────────────────────────────────

    /// "Continue" on the review stage; enters Importing and submits.
    pub async fn continue_review(&self) -> Result<ImportStart, AppError> {
        self.session.lock().await.continue_to_import()?;
        self.start_import().await
    }

    /// "Continue" on the duplicates stage; enters Importing and submits.
    pub async fn confirm_strategy(&self) -> Result<ImportStart, AppError> {
        {
            let mut session = self.session.lock().await;
            session.confirm_strategy()?;
            info!(
                "[IMPORT-WIZARD] Strategy confirmed: {}",
                session.strategy.as_str()
            );
        }
        self.start_import().await
    }

    /// Submits the import for the current Importing entry.
    ///
    /// Safe to call more than once: only the first call sends the request,
    /// later ones return `ImportStart::AlreadyRunning`. Resolves after the
    /// response and, on success, after the summary delay. The request and
    /// its bookkeeping run on their own task and finish even if this future
    /// is dropped.
    pub async fn start_import(&self) -> Result<ImportStart, AppError> {
        let (submission, scope) = {
            let mut session = self.session.lock().await;
            let submission = match session.begin_submission()? {
                Some(submission) => submission,
                None => {
                    info!("[IMPORT-WIZARD] Import already submitted, ignoring");
                    return Ok(ImportStart::AlreadyRunning);
                }
            };
            let scope = self.run_scope.lock().await.clone();
            (submission, scope)
        };

        info!(
            "[IMPORT-WIZARD] Submitting import (strategy={}, notify={})",
            submission.strategy.as_str(),
            submission.send_notifications
        );

        let this = self.clone();
        join_request(tokio::spawn(async move {
            this.run_import(submission, scope).await
        }))
        .await
    }

    async fn run_import(
        &self,
        submission: Submission,
        scope: CancellationToken,
    ) -> Result<ImportStart, AppError> {
        self.progress.reset();
        let ticker = ProgressTask::spawn_scoped(
            self.progress_source.as_ref(),
            self.progress.clone(),
            &scope,
        );

        let result = self
            .api
            .import_file(
                &submission.file,
                submission.strategy,
                submission.send_notifications,
            )
            .await;

        ticker.stop().await;

        match result {
            Ok(import_result) => {
                {
                    let mut session = self.session.lock().await;
                    if session.id != submission.session_id {
                        info!("[IMPORT-WIZARD] Session reset during import, dropping response");
                        return Ok(ImportStart::Submitted);
                    }
                    session.complete_import(import_result)?;
                    self.progress.complete();
                }

                tokio::time::sleep(self.summary_delay).await;

                let mut session = self.session.lock().await;
                if session.id == submission.session_id && session.stage == ImportStage::Importing {
                    session.enter_summary()?;
                    info!("[IMPORT-WIZARD] Import finished -> summary");
                }
                Ok(ImportStart::Submitted)
            }
            Err(e) => {
                warn!("[IMPORT-WIZARD] Import failed: {}", e);

                let mut session = self.session.lock().await;
                if session.id == submission.session_id {
                    self.progress.reset();
                    session.fail_import(e.user_message())?;
                }
                Err(e)
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Summary
    // ─────────────────────────────────────────────────────────────────────────

    /// "Done": resets the wizard and notifies the host.
    pub async fn finish(&self) -> Result<(), AppError> {
        self.session.lock().await.finish()?;
        self.progress.reset();

        info!("[IMPORT-WIZARD] Wizard finished");
        if let Some(callback) = &self.on_success {
            callback();
        }
        Ok(())
    }

    /// Wizard closed: resets without notifying the host. A request still in
    /// flight completes but its response is discarded, and its progress
    /// ticker is stopped.
    pub async fn close(&self) {
        let mut session = self.session.lock().await;
        session.reset();

        let mut scope = self.run_scope.lock().await;
        scope.cancel();
        *scope = CancellationToken::new();

        self.progress.reset();
        info!("[IMPORT-WIZARD] Wizard closed");
    }
}

async fn join_request<T>(task: JoinHandle<Result<T, AppError>>) -> Result<T, AppError> {
    task.await
        .map_err(|e| AppError::Internal(format!("Request task failed: {}", e)))?
}
