//! Logging integration for the kitty upgrade engine.
//!
//! Provides helpers for configuring [`tracing`]-based logging from
//! [`Settings`](crate::settings::Settings) and for creating per-upgrade spans.

use std::path::Path;

use crate::settings::Settings;

/// Sets up the global tracing subscriber based on the given settings.
///
/// The log level is read from `settings.log_level` (e.g. "debug", "info", "warn",
/// "error"). In debug mode a pretty, human-readable format is used; otherwise
/// a structured JSON format is used.
///
/// Installing a second subscriber is a no-op.
pub fn setup_logging(settings: &Settings) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&settings.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    if settings.debug {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(true)
            .with_line_number(true)
            .pretty()
            .try_init()
            .ok();
    } else {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .try_init()
            .ok();
    }
}

/// Creates a tracing span for one upgrade run.
///
/// Every event emitted while the span is entered carries the project path.
///
/// # Examples
///
/// ```
/// use kitty_core::logging::upgrade_span;
///
/// let span = upgrade_span(std::path::Path::new("/work/my-project"));
/// let _guard = span.enter();
/// tracing::info!("planning upgrade");
/// ```
pub fn upgrade_span(project: &Path) -> tracing::Span {
    tracing::info_span!("upgrade", project = %project.display())
}
