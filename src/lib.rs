//! Customer CSV import wizard for the salon admin API.
//!
//! [`wizard::ImportController`] is the entry point: it takes a selected file
//! through client-side checks, server validation, duplicate review and the
//! import itself, and exposes a [`wizard::WizardView`] for rendering.

pub mod api;
pub mod config;
pub mod error;
pub mod validation;
pub mod wizard;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub use api::{ImportApiClient, LoggingMode};
pub use config::{ClientConfig, ProgressConfig};
pub use error::{AppError, ErrorPresentation};
pub use validation::{FileRejection, SelectedFile};
pub use wizard::{ImportController, ImportStage, WizardView};

/// Installs a fmt subscriber filtered by `RUST_LOG` (default
/// `salon_import=info`). Does nothing if a subscriber is already set.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "salon_import=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
