//! Wizard stages and the transition table between them.

use serde::{Deserialize, Serialize};

/// The step the wizard is currently showing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStage {
    #[default]
    Upload,
    Validating,
    Review,
    Duplicates,
    Importing,
    Summary,
}

impl ImportStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportStage::Upload => "upload",
            ImportStage::Validating => "validating",
            ImportStage::Review => "review",
            ImportStage::Duplicates => "duplicates",
            ImportStage::Importing => "importing",
            ImportStage::Summary => "summary",
        }
    }

    /// Step title shown in the wizard header.
    pub fn title(&self) -> &'static str {
        match self {
            ImportStage::Upload => "Upload File",
            ImportStage::Validating => "Validating",
            ImportStage::Review => "Review",
            ImportStage::Duplicates => "Resolve Duplicates",
            ImportStage::Importing => "Importing",
            ImportStage::Summary => "Import Complete",
        }
    }

    /// True while a request for this stage is on the wire.
    pub fn is_busy(&self) -> bool {
        matches!(self, ImportStage::Validating | ImportStage::Importing)
    }
}

impl std::fmt::Display for ImportStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs that move the wizard between stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardEvent {
    /// An accepted file was sent to the validation endpoint.
    ValidationDispatched,
    /// Validation succeeded; `has_duplicates` picks the next stage.
    ValidationSucceeded { has_duplicates: bool },
    ValidationFailed,
    /// "Continue" on the review stage.
    Continue,
    /// "Continue" on the duplicates stage with a strategy chosen.
    StrategyConfirmed,
    Back,
    ImportSucceeded,
    ImportFailed,
    /// "Done" on the summary stage.
    Finish,
}

impl WizardEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            WizardEvent::ValidationDispatched => "validation_dispatched",
            WizardEvent::ValidationSucceeded { .. } => "validation_succeeded",
            WizardEvent::ValidationFailed => "validation_failed",
            WizardEvent::Continue => "continue",
            WizardEvent::StrategyConfirmed => "strategy_confirmed",
            WizardEvent::Back => "back",
            WizardEvent::ImportSucceeded => "import_succeeded",
            WizardEvent::ImportFailed => "import_failed",
            WizardEvent::Finish => "finish",
        }
    }
}

/// Returns the stage that follows `event` in `stage`, or `None` when the
/// event is not legal there.
pub fn next_stage(stage: ImportStage, event: WizardEvent) -> Option<ImportStage> {
    use ImportStage::*;
    use WizardEvent as E;

    match (stage, event) {
        (Upload, E::ValidationDispatched) => Some(Validating),
        (Validating, E::ValidationSucceeded { has_duplicates: false }) => Some(Review),
        (Validating, E::ValidationSucceeded { has_duplicates: true }) => Some(Duplicates),
        (Validating, E::ValidationFailed) => Some(Upload),
        (Review, E::Continue) => Some(Importing),
        (Duplicates, E::StrategyConfirmed) => Some(Importing),
        (Review | Duplicates, E::Back) => Some(Upload),
        (Importing, E::ImportSucceeded) => Some(Summary),
        (Importing, E::ImportFailed) => Some(Upload),
        (Summary, E::Finish) => Some(Upload),
        _ => None,
    }
}
