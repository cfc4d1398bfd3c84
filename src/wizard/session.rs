//! State of one wizard run.
//!
//! `ImportSession` is plain data plus synchronous transitions. Every mutation
//! goes through `next_stage`, so a method called in the wrong stage returns
//! `AppError::InvalidTransition` and leaves the session untouched. The
//! controller wraps it in a mutex and does the I/O.

use tracing::warn;
use uuid::Uuid;

use crate::api::types::{DuplicateStrategy, ImportResult, ValidationResult};
use crate::error::AppError;
use crate::validation::{FileRejection, PreflightReport, SelectedFile};
use crate::wizard::duplicates::DuplicateNavigator;
use crate::wizard::stage::{next_stage, ImportStage, WizardEvent};

/// Everything the import request needs, captured when it is dispatched.
#[derive(Debug, Clone)]
pub struct Submission {
    pub session_id: Uuid,
    pub file: SelectedFile,
    pub strategy: DuplicateStrategy,
    pub send_notifications: bool,
}

#[derive(Debug, Clone)]
pub struct ImportSession {
    /// Changes on every reset; late responses for an older id are dropped.
    pub id: Uuid,
    pub stage: ImportStage,
    pub selected_file: Option<SelectedFile>,
    /// Why the last drop was refused. Cleared by the next accepted file.
    pub rejection: Option<FileRejection>,
    pub preflight: Option<PreflightReport>,
    pub validation: Option<ValidationResult>,
    pub strategy: DuplicateStrategy,
    pub send_notifications: bool,
    pub duplicate_cursor: usize,
    pub submission_in_flight: bool,
    pub import_result: Option<ImportResult>,
    /// User-facing message of the last failed request.
    pub error: Option<String>,
}

impl ImportSession {
    pub fn new(send_notifications: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            stage: ImportStage::Upload,
            selected_file: None,
            rejection: None,
            preflight: None,
            validation: None,
            strategy: DuplicateStrategy::default(),
            send_notifications,
            duplicate_cursor: 0,
            submission_in_flight: false,
            import_result: None,
            error: None,
        }
    }

    /// Starts a fresh run. The notification preference survives.
    pub fn reset(&mut self) {
        *self = Self::new(self.send_notifications);
    }

    fn transition(&mut self, event: WizardEvent) -> Result<ImportStage, AppError> {
        let next = next_stage(self.stage, event).ok_or(AppError::InvalidTransition {
            from: self.stage.as_str(),
            event: event.as_str(),
        })?;
        self.stage = next;
        Ok(next)
    }

    fn require_stage(&self, stage: ImportStage, event: &'static str) -> Result<(), AppError> {
        if self.stage == stage {
            Ok(())
        } else {
            Err(AppError::InvalidTransition {
                from: self.stage.as_str(),
                event,
            })
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Upload
    // ─────────────────────────────────────────────────────────────────────────

    /// Stores an accepted file, replacing any previous one.
    pub fn accept_file(
        &mut self,
        file: SelectedFile,
        preflight: PreflightReport,
    ) -> Result<(), AppError> {
        self.require_stage(ImportStage::Upload, "select_file")?;
        self.selected_file = Some(file);
        self.preflight = Some(preflight);
        self.rejection = None;
        self.error = None;
        Ok(())
    }

    /// Records a refused drop. A previously accepted file is kept.
    pub fn reject_file(&mut self, rejection: FileRejection) -> Result<(), AppError> {
        self.require_stage(ImportStage::Upload, "select_file")?;
        self.rejection = Some(rejection);
        Ok(())
    }

    pub fn clear_file(&mut self) -> Result<(), AppError> {
        self.require_stage(ImportStage::Upload, "clear_file")?;
        self.selected_file = None;
        self.preflight = None;
        self.rejection = None;
        Ok(())
    }

    /// True when "Validate & Continue" is enabled.
    pub fn can_validate(&self) -> bool {
        self.stage == ImportStage::Upload && self.selected_file.is_some()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Validation
    // ─────────────────────────────────────────────────────────────────────────

    /// Moves to Validating and returns the file to send.
    pub fn begin_validation(&mut self) -> Result<SelectedFile, AppError> {
        self.require_stage(ImportStage::Upload, "validate")?;
        let file = self.selected_file.clone().ok_or(AppError::NoFileSelected)?;
        self.transition(WizardEvent::ValidationDispatched)?;
        self.error = None;
        self.validation = None;
        Ok(file)
    }

    /// Stores the verdict and branches to Review or Duplicates.
    pub fn complete_validation(&mut self, result: ValidationResult) -> Result<ImportStage, AppError> {
        if result.duplicate_count_mismatch() {
            warn!(
                "[IMPORT-WIZARD] duplicates_found={} but {} matches returned",
                result.duplicates_found,
                result.duplicates.len()
            );
        }

        let has_duplicates = result.has_duplicates();
        let stage = self.transition(WizardEvent::ValidationSucceeded { has_duplicates })?;
        self.validation = Some(result);
        self.duplicate_cursor = 0;
        self.strategy = DuplicateStrategy::default();
        Ok(stage)
    }

    /// Returns to Upload with the message shown. The file must be chosen again.
    pub fn fail_validation(&mut self, message: String) -> Result<ImportStage, AppError> {
        let stage = self.transition(WizardEvent::ValidationFailed)?;
        self.error = Some(message);
        self.selected_file = None;
        self.preflight = None;
        self.validation = None;
        Ok(stage)
    }

    /// Back from Review or Duplicates. The file is kept.
    pub fn back(&mut self) -> Result<ImportStage, AppError> {
        let stage = self.transition(WizardEvent::Back)?;
        self.validation = None;
        self.duplicate_cursor = 0;
        self.strategy = DuplicateStrategy::default();
        Ok(stage)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Duplicates
    // ─────────────────────────────────────────────────────────────────────────

    pub fn duplicates(&self) -> Option<DuplicateNavigator<'_>> {
        let validation = self.validation.as_ref()?;
        DuplicateNavigator::new(&validation.duplicates, self.duplicate_cursor)
    }

    pub fn select_strategy(&mut self, strategy: DuplicateStrategy) -> Result<(), AppError> {
        self.require_stage(ImportStage::Duplicates, "select_strategy")?;
        self.strategy = strategy;
        Ok(())
    }

    pub fn next_duplicate(&mut self) -> Result<usize, AppError> {
        self.require_stage(ImportStage::Duplicates, "next_duplicate")?;
        if let Some(next) = self.duplicates().map(|nav| nav.next_index()) {
            self.duplicate_cursor = next;
        }
        Ok(self.duplicate_cursor)
    }

    pub fn previous_duplicate(&mut self) -> Result<usize, AppError> {
        self.require_stage(ImportStage::Duplicates, "previous_duplicate")?;
        if let Some(previous) = self.duplicates().map(|nav| nav.previous_index()) {
            self.duplicate_cursor = previous;
        }
        Ok(self.duplicate_cursor)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Import
    // ─────────────────────────────────────────────────────────────────────────

    /// Review → Importing.
    pub fn continue_to_import(&mut self) -> Result<ImportStage, AppError> {
        self.require_import_inputs("continue")?;
        self.transition(WizardEvent::Continue)
    }

    /// Duplicates → Importing with the chosen strategy.
    pub fn confirm_strategy(&mut self) -> Result<ImportStage, AppError> {
        self.require_import_inputs("confirm_strategy")?;
        self.transition(WizardEvent::StrategyConfirmed)
    }

    fn require_import_inputs(&self, event: &'static str) -> Result<(), AppError> {
        if self.selected_file.is_none() {
            return Err(AppError::NoFileSelected);
        }
        if self.validation.is_none() {
            return Err(AppError::InvalidTransition {
                from: self.stage.as_str(),
                event,
            });
        }
        Ok(())
    }

    /// Checks and sets the in-flight flag.
    ///
    /// Returns `Ok(None)` when this stage entry already submitted.
    pub fn begin_submission(&mut self) -> Result<Option<Submission>, AppError> {
        self.require_stage(ImportStage::Importing, "start_import")?;
        if self.submission_in_flight || self.import_result.is_some() {
            return Ok(None);
        }

        let file = self.selected_file.clone().ok_or(AppError::NoFileSelected)?;
        self.submission_in_flight = true;
        self.error = None;

        Ok(Some(Submission {
            session_id: self.id,
            file,
            strategy: self.strategy,
            send_notifications: self.send_notifications,
        }))
    }

    /// Stores the result. The stage stays Importing until `enter_summary`.
    pub fn complete_import(&mut self, result: ImportResult) -> Result<(), AppError> {
        self.require_stage(ImportStage::Importing, "import_succeeded")?;
        self.submission_in_flight = false;
        self.import_result = Some(result);
        Ok(())
    }

    pub fn enter_summary(&mut self) -> Result<ImportStage, AppError> {
        if self.import_result.is_none() {
            return Err(AppError::InvalidTransition {
                from: self.stage.as_str(),
                event: "import_succeeded",
            });
        }
        self.transition(WizardEvent::ImportSucceeded)
    }

    /// Returns to Upload with the message shown. The file is kept for a retry.
    pub fn fail_import(&mut self, message: String) -> Result<ImportStage, AppError> {
        let stage = self.transition(WizardEvent::ImportFailed)?;
        self.submission_in_flight = false;
        self.error = Some(message);
        self.validation = None;
        self.import_result = None;
        self.duplicate_cursor = 0;
        self.strategy = DuplicateStrategy::default();
        Ok(stage)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Summary
    // ─────────────────────────────────────────────────────────────────────────

    /// "Done": resets for the next run.
    pub fn finish(&mut self) -> Result<(), AppError> {
        self.transition(WizardEvent::Finish)?;
        self.reset();
        Ok(())
    }
}

impl Default for ImportSession {
    fn default() -> Self {
        Self::new(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::{DuplicateMatch, ExistingRecord, IncomingRow, MatchConfidence};
    use crate::validation::preflight;

    fn csv_file() -> SelectedFile {
        SelectedFile::new(
            "valid.csv",
            Some("text/csv"),
            b"first_name,email\nAna,ana@example.com\n".to_vec(),
        )
    }

    fn validation(duplicates: usize) -> ValidationResult {
        let matches = (0..duplicates)
            .map(|i| DuplicateMatch {
                existing_record: ExistingRecord {
                    id: i.to_string(),
                    first_name: None,
                    last_name: None,
                    email: None,
                    phone: None,
                    status: None,
                },
                incoming_row: IncomingRow {
                    row_number: i as u64 + 2,
                    first_name: None,
                    last_name: None,
                    email: None,
                    phone: None,
                },
                match_confidence: MatchConfidence::High,
            })
            .collect();

        ValidationResult {
            total_rows: 5,
            valid_rows: 5,
            invalid_rows: None,
            duplicates_found: duplicates as u64,
            duplicates: matches,
            errors: Vec::new(),
        }
    }

    fn import_result() -> ImportResult {
        ImportResult {
            total_rows: 5,
            created_count: 5,
            updated_count: 0,
            skipped_count: 0,
            failed_count: 0,
            errors: Vec::new(),
        }
    }

    fn session_at(stage: ImportStage, duplicates: usize) -> ImportSession {
        let mut session = ImportSession::default();
        let file = csv_file();
        let report = preflight(&file.bytes, &[]);
        session.accept_file(file, report).unwrap();
        if stage == ImportStage::Upload {
            return session;
        }
        session.begin_validation().unwrap();
        if stage == ImportStage::Validating {
            return session;
        }
        session.complete_validation(validation(duplicates)).unwrap();
        if matches!(stage, ImportStage::Review | ImportStage::Duplicates) {
            return session;
        }
        if duplicates > 0 {
            session.confirm_strategy().unwrap();
        } else {
            session.continue_to_import().unwrap();
        }
        if stage == ImportStage::Importing {
            return session;
        }
        session.begin_submission().unwrap();
        session.complete_import(import_result()).unwrap();
        session.enter_summary().unwrap();
        session
    }

    #[test]
    fn validate_requires_a_file() {
        let mut session = ImportSession::default();
        assert!(!session.can_validate());
        assert!(matches!(
            session.begin_validation(),
            Err(AppError::NoFileSelected)
        ));
        assert_eq!(session.stage, ImportStage::Upload);
    }

    #[test]
    fn rejection_keeps_stage_and_previous_file() {
        let mut session = session_at(ImportStage::Upload, 0);

        session
            .reject_file(FileRejection::MultipleFiles { count: 2 })
            .unwrap();

        assert_eq!(session.stage, ImportStage::Upload);
        assert!(session.selected_file.is_some());
        assert!(session.rejection.is_some());
    }

    #[test]
    fn zero_duplicates_enter_review() {
        let session = session_at(ImportStage::Review, 0);
        assert_eq!(session.stage, ImportStage::Review);
    }

    #[test]
    fn duplicates_enter_duplicate_stage() {
        let session = session_at(ImportStage::Duplicates, 2);
        assert_eq!(session.stage, ImportStage::Duplicates);
        assert_eq!(session.strategy, DuplicateStrategy::Skip);
    }

    #[test]
    fn count_without_list_enters_review() {
        let mut session = session_at(ImportStage::Validating, 0);
        let mut result = validation(0);
        result.duplicates_found = 3;

        assert_eq!(
            session.complete_validation(result).unwrap(),
            ImportStage::Review
        );
    }

    #[test]
    fn validation_failure_clears_file() {
        let mut session = session_at(ImportStage::Validating, 0);

        session.fail_validation("Missing email column".into()).unwrap();

        assert_eq!(session.stage, ImportStage::Upload);
        assert_eq!(session.error.as_deref(), Some("Missing email column"));
        assert!(session.selected_file.is_none());
        assert!(session.validation.is_none());
    }

    #[test]
    fn back_keeps_file_and_clears_validation() {
        let mut session = session_at(ImportStage::Duplicates, 2);
        session.select_strategy(DuplicateStrategy::Overwrite).unwrap();
        session.next_duplicate().unwrap();

        session.back().unwrap();

        assert_eq!(session.stage, ImportStage::Upload);
        assert!(session.selected_file.is_some());
        assert!(session.validation.is_none());
        assert_eq!(session.duplicate_cursor, 0);
        assert_eq!(session.strategy, DuplicateStrategy::Skip);
    }

    #[test]
    fn duplicate_navigation_clamps() {
        let mut session = session_at(ImportStage::Duplicates, 2);

        assert_eq!(session.previous_duplicate().unwrap(), 0);
        assert_eq!(session.next_duplicate().unwrap(), 1);
        assert_eq!(session.next_duplicate().unwrap(), 1);
        assert_eq!(session.previous_duplicate().unwrap(), 0);
    }

    #[test]
    fn strategy_only_changes_on_duplicate_stage() {
        let mut session = session_at(ImportStage::Review, 0);

        assert!(matches!(
            session.select_strategy(DuplicateStrategy::Overwrite),
            Err(AppError::InvalidTransition { .. })
        ));
        assert_eq!(session.strategy, DuplicateStrategy::Skip);
    }

    #[test]
    fn submission_is_handed_out_once() {
        let mut session = session_at(ImportStage::Duplicates, 2);
        session.select_strategy(DuplicateStrategy::Overwrite).unwrap();
        session.confirm_strategy().unwrap();

        let first = session.begin_submission().unwrap().expect("first submission");
        let second = session.begin_submission().unwrap();

        assert_eq!(first.strategy, DuplicateStrategy::Overwrite);
        assert_eq!(first.session_id, session.id);
        assert!(second.is_none());
        assert!(session.submission_in_flight);
    }

    #[test]
    fn submission_requires_importing_stage() {
        let mut session = session_at(ImportStage::Review, 0);
        assert!(matches!(
            session.begin_submission(),
            Err(AppError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn import_failure_keeps_file_for_retry() {
        let mut session = session_at(ImportStage::Importing, 2);
        session.begin_submission().unwrap();

        session.fail_import("Import failed".into()).unwrap();

        assert_eq!(session.stage, ImportStage::Upload);
        assert!(session.selected_file.is_some());
        assert!(session.validation.is_none());
        assert!(session.import_result.is_none());
        assert!(!session.submission_in_flight);
        assert!(session.can_validate());
    }

    #[test]
    fn summary_requires_result() {
        let mut session = session_at(ImportStage::Importing, 0);
        assert!(session.enter_summary().is_err());
        assert_eq!(session.stage, ImportStage::Importing);
    }

    #[test]
    fn finish_resets_with_new_id() {
        let mut session = session_at(ImportStage::Summary, 0);
        session.send_notifications = true;
        let old_id = session.id;

        session.finish().unwrap();

        assert_eq!(session.stage, ImportStage::Upload);
        assert!(session.selected_file.is_none());
        assert!(session.import_result.is_none());
        assert!(session.send_notifications);
        assert_ne!(session.id, old_id);
    }

    #[test]
    fn illegal_calls_leave_session_untouched() {
        let mut session = session_at(ImportStage::Summary, 0);

        assert!(session.back().is_err());
        assert!(session.clear_file().is_err());
        assert!(session.continue_to_import().is_err());
        assert_eq!(session.stage, ImportStage::Summary);
        assert!(session.import_result.is_some());
    }
}
