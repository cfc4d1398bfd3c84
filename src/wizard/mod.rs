//! The customer import wizard: stage machine, session state, duplicate
//! review, progress reporting and the controller that drives them.

pub mod controller;
pub mod duplicates;
pub mod progress;
pub mod session;
pub mod stage;
pub mod view;

pub use controller::{ImportApi, ImportController, ImportStart, SuccessCallback};
pub use duplicates::{compare_fields, DuplicateNavigator, FieldComparison};
pub use progress::{
    ImportProgress, ProgressPublisher, ProgressSource, ProgressTask, SyntheticProgress,
};
pub use session::{ImportSession, Submission};
pub use stage::{next_stage, ImportStage, WizardEvent};
pub use view::{
    duplicates_view, render, DuplicatesView, ImportingView, ReviewView, SummaryView, UploadView,
    ValidatingView, WizardView,
};
