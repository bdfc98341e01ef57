pub mod config;
pub mod dispatcher;
pub mod errors;
pub mod fetcher;
pub mod kinds;
pub mod models;
pub mod pipeline;
pub mod session;
pub mod store;

pub use crate::config::{Settings, ViewSettings};
pub use crate::dispatcher::{ActionDispatcher, Feedback};
pub use crate::errors::{AppError, AppResult};
pub use crate::fetcher::CollectionFetcher;
pub use crate::kinds::RecordKind;
pub use crate::models::{
    ActionOutcome, ActionRequest, AssetUpload, CurrentUser, DateRange, FetchRequest, LoadState, NotificationSpec,
    PageResponse, Predicate, Record, ReferenceJoin, SortDirection, SortSpec, StatusCounts, UploadedAsset, ViewState,
};
pub use crate::session::{FetchTicket, ViewOutput, ViewScope, ViewSession};
pub use crate::store::memory::InMemoryStore;
pub use crate::store::sqlite::SqliteStore;
pub use crate::store::{AssetUploader, DataStore, Identity, StaticIdentity};

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;

static LOG_GUARD: std::sync::OnceLock<WorkerGuard> = std::sync::OnceLock::new();

/// Installs a JSON subscriber writing to a daily-rolling file under `log_dir/logs`.
/// `RUST_LOG` takes precedence over `default_filter`.
pub fn init_tracing(log_dir: &Path, default_filter: &str) -> AppResult<()> {
    let log_dir = log_dir.join("logs");
    std::fs::create_dir_all(&log_dir)?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "views.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .json()
        .with_writer(non_blocking)
        .try_init()
        .map_err(|error| AppError::Internal(error.to_string()))
}

/// Same as [`init_tracing`] with the filter taken from `settings.log_filter`.
pub fn init_tracing_with_settings(log_dir: &Path, settings: &Settings) -> AppResult<()> {
    init_tracing(log_dir, &settings.log_filter)
}
