//! Read-only snapshots of the session, one per stage, for the host UI.

use serde::Serialize;

use crate::api::types::{DuplicateStrategy, ImportResult, ValidationResult};
use crate::wizard::duplicates::FieldComparison;
use crate::wizard::progress::ImportProgress;
use crate::wizard::session::ImportSession;
use crate::wizard::stage::ImportStage;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "stage", content = "view", rename_all = "snake_case")]
pub enum WizardView {
    Upload(UploadView),
    Validating(ValidatingView),
    Review(ReviewView),
    /// `None` only if the match list is empty, which the stage gating prevents.
    Duplicates(Option<DuplicatesView>),
    Importing(ImportingView),
    Summary(SummaryView),
}

impl WizardView {
    pub fn stage(&self) -> ImportStage {
        match self {
            WizardView::Upload(_) => ImportStage::Upload,
            WizardView::Validating(_) => ImportStage::Validating,
            WizardView::Review(_) => ImportStage::Review,
            WizardView::Duplicates(_) => ImportStage::Duplicates,
            WizardView::Importing(_) => ImportStage::Importing,
            WizardView::Summary(_) => ImportStage::Summary,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadView {
    pub file_name: Option<String>,
    pub file_size_bytes: Option<u64>,
    /// Message for the last refused drop.
    pub rejection: Option<String>,
    /// Message of the last failed validation or import.
    pub error: Option<String>,
    /// Advisory preflight findings.
    pub warnings: Vec<String>,
    pub estimated_rows: Option<u64>,
    /// "Validate & Continue" is enabled.
    pub can_validate: bool,
    pub send_notifications: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidatingView {
    pub file_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewView {
    pub total_rows: u64,
    pub valid_rows: u64,
    pub invalid_rows: u64,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicatesView {
    /// "Duplicate 1 of 2"
    pub position_label: String,
    pub index: usize,
    pub total: usize,
    /// "High confidence" or "Medium confidence"
    pub confidence_label: &'static str,
    pub existing_id: String,
    pub existing_status: Option<String>,
    pub incoming_row: u64,
    pub fields: Vec<FieldComparison>,
    pub strategy: DuplicateStrategy,
    pub has_previous: bool,
    pub has_next: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportingView {
    pub percent: u8,
    pub strategy: DuplicateStrategy,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryView {
    pub processed: u64,
    pub succeeded: u64,
    pub created: u64,
    pub updated: u64,
    pub skipped: u64,
    pub failed: u64,
    pub errors: Vec<String>,
}

/// Builds the view for the session's current stage.
pub fn render(session: &ImportSession, progress: ImportProgress) -> WizardView {
    match session.stage {
        ImportStage::Upload => WizardView::Upload(upload_view(session)),
        ImportStage::Validating => WizardView::Validating(ValidatingView {
            file_name: session
                .selected_file
                .as_ref()
                .map(|f| f.name.clone())
                .unwrap_or_default(),
        }),
        ImportStage::Review => match &session.validation {
            Some(validation) => WizardView::Review(ReviewView::from(validation)),
            None => WizardView::Upload(upload_view(session)),
        },
        ImportStage::Duplicates => WizardView::Duplicates(duplicates_view(session)),
        ImportStage::Importing => WizardView::Importing(ImportingView {
            percent: progress.percent,
            strategy: session.strategy,
        }),
        ImportStage::Summary => match &session.import_result {
            Some(result) => WizardView::Summary(SummaryView::from(result)),
            None => WizardView::Upload(upload_view(session)),
        },
    }
}

fn upload_view(session: &ImportSession) -> UploadView {
    let file = session.selected_file.as_ref();
    let report = session.preflight.as_ref();

    UploadView {
        file_name: file.map(|f| f.name.clone()),
        file_size_bytes: file.map(|f| f.size_bytes()),
        rejection: session.rejection.as_ref().map(|r| r.message()),
        error: session.error.clone(),
        warnings: report
            .map(|r| r.warnings.iter().map(|w| w.message()).collect())
            .unwrap_or_default(),
        estimated_rows: report.and_then(|r| r.estimated_total_rows),
        can_validate: session.can_validate(),
        send_notifications: session.send_notifications,
    }
}

/// The duplicate stage view, or `None` when there is nothing to show.
pub fn duplicates_view(session: &ImportSession) -> Option<DuplicatesView> {
    let nav = session.duplicates()?;
    let current = nav.current();

    Some(DuplicatesView {
        position_label: nav.position_label(),
        index: nav.index(),
        total: nav.total(),
        confidence_label: current.match_confidence.label(),
        existing_id: current.existing_record.id.clone(),
        existing_status: current.existing_record.status.clone(),
        incoming_row: current.incoming_row.row_number,
        fields: nav.comparison(),
        strategy: session.strategy,
        has_previous: !nav.is_first(),
        has_next: !nav.is_last(),
    })
}

impl From<&ValidationResult> for ReviewView {
    fn from(validation: &ValidationResult) -> Self {
        Self {
            total_rows: validation.total_rows,
            valid_rows: validation.valid_rows,
            invalid_rows: validation.invalid_count(),
            errors: validation.errors.iter().map(|e| e.describe()).collect(),
        }
    }
}

impl From<&ImportResult> for SummaryView {
    fn from(result: &ImportResult) -> Self {
        Self {
            processed: result.total_rows,
            succeeded: result.created_count + result.updated_count,
            created: result.created_count,
            updated: result.updated_count,
            skipped: result.skipped_count,
            failed: result.failed_count,
            errors: result.errors.iter().map(|e| e.describe()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::{DuplicateMatch, ExistingRecord, IncomingRow, MatchConfidence, RowError};
    use crate::validation::{preflight, FileRejection, SelectedFile};

    fn dupe(id: &str, confidence: MatchConfidence) -> DuplicateMatch {
        DuplicateMatch {
            existing_record: ExistingRecord {
                id: id.to_string(),
                first_name: Some("Ana".into()),
                last_name: Some("Lopez".into()),
                email: Some("ana@example.com".into()),
                phone: None,
                status: Some("active".into()),
            },
            incoming_row: IncomingRow {
                row_number: 3,
                first_name: Some("Ana".into()),
                last_name: Some("Lopez".into()),
                email: Some("ana@example.com".into()),
                phone: Some("555-0100".into()),
            },
            match_confidence: confidence,
        }
    }

    fn session_with_duplicates() -> ImportSession {
        let mut session = ImportSession::default();
        let file = SelectedFile::new("dupes.csv", Some("text/csv"), b"email\na@b.c\n".to_vec());
        let report = preflight(&file.bytes, &[]);
        session.accept_file(file, report).unwrap();
        session.begin_validation().unwrap();
        session
            .complete_validation(ValidationResult {
                total_rows: 5,
                valid_rows: 5,
                invalid_rows: None,
                duplicates_found: 2,
                duplicates: vec![
                    dupe("42", MatchConfidence::High),
                    dupe("43", MatchConfidence::Medium),
                ],
                errors: Vec::new(),
            })
            .unwrap();
        session
    }

    #[test]
    fn empty_upload_view_disables_validate() {
        let session = ImportSession::default();

        match render(&session, ImportProgress::default()) {
            WizardView::Upload(view) => {
                assert!(!view.can_validate);
                assert!(view.file_name.is_none());
            }
            other => panic!("Expected upload view, got {:?}", other),
        }
    }

    #[test]
    fn upload_view_shows_rejection_message() {
        let mut session = ImportSession::default();
        session
            .reject_file(FileRejection::NotCsv {
                file_name: "bad.pdf".into(),
            })
            .unwrap();

        match render(&session, ImportProgress::default()) {
            WizardView::Upload(view) => {
                assert_eq!(view.rejection.as_deref(), Some("Only CSV files are accepted"));
                assert!(!view.can_validate);
            }
            other => panic!("Expected upload view, got {:?}", other),
        }
    }

    #[test]
    fn duplicates_view_labels_position_and_confidence() {
        let mut session = session_with_duplicates();

        let first = duplicates_view(&session).unwrap();
        assert_eq!(first.position_label, "Duplicate 1 of 2");
        assert_eq!(first.confidence_label, "High confidence");
        assert!(!first.has_previous);
        assert!(first.has_next);

        session.next_duplicate().unwrap();
        let second = duplicates_view(&session).unwrap();
        assert_eq!(second.position_label, "Duplicate 2 of 2");
        assert_eq!(second.confidence_label, "Medium confidence");
        assert_eq!(second.existing_id, "43");
        assert!(!second.has_next);
    }

    #[test]
    fn duplicates_view_is_none_without_matches() {
        assert!(duplicates_view(&ImportSession::default()).is_none());
    }

    #[test]
    fn importing_view_carries_progress() {
        let mut session = session_with_duplicates();
        session.confirm_strategy().unwrap();

        let view = render(&session, ImportProgress { percent: 40 });

        assert_eq!(
            view,
            WizardView::Importing(ImportingView {
                percent: 40,
                strategy: DuplicateStrategy::Skip,
            })
        );
    }

    #[test]
    fn summary_view_totals() {
        let result = ImportResult {
            total_rows: 5,
            created_count: 3,
            updated_count: 1,
            skipped_count: 0,
            failed_count: 1,
            errors: vec![RowError {
                row: 4,
                field: Some("email".into()),
                message: "invalid".into(),
            }],
        };

        let view = SummaryView::from(&result);

        assert_eq!(view.processed, 5);
        assert_eq!(view.succeeded, 4);
        assert_eq!(view.failed, 1);
        assert_eq!(view.errors, vec!["Row 4 (email): invalid".to_string()]);
    }

    #[test]
    fn view_serializes_with_stage_tag() {
        let json = serde_json::to_value(render(
            &ImportSession::default(),
            ImportProgress::default(),
        ))
        .unwrap();
        assert_eq!(json["stage"], "upload");
    }
}
