//! Logging utilities for seatcast.
//!
//! Provides structured JSON or human-readable logging and a run context that
//! tags every event of one forecast run with the same run id.
//!
//! # Noise Filtering
//!
//! Thread-pool internals (rayon) are set to `warn` so per-block worker chatter
//! does not bury the forecast events.

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Default noisy modules that should be filtered to warn level.
pub const NOISY_MODULES: &[&str] = &["rayon", "rayon_core"];

/// Build the directive string for the filter.
fn build_directives(log_level: &str, excluded_targets: &[String]) -> String {
    let mut directives = String::from(log_level);

    for module in NOISY_MODULES {
        directives.push_str(&format!(",{}=warn", module));
    }

    for target in excluded_targets {
        directives.push_str(&format!(",{}=warn", target));
    }

    directives
}

/// Build the default EnvFilter with noise suppression.
///
/// `RUST_LOG` takes precedence when set.
fn build_filter(log_level: &str, excluded_targets: &[String]) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    EnvFilter::new(build_directives(log_level, excluded_targets))
}

/// Initialize logging with the given configuration.
///
/// # Arguments
///
/// * `log_level` - Base log level (trace, debug, info, warn, error)
/// * `log_format` - Output format: "json" for structured JSON, "pretty" for human-readable
pub fn init_logging(log_level: &str, log_format: &str) {
    init_logging_with_exclusions(log_level, log_format, &[]);
}

/// Initialize logging with custom excluded targets.
///
/// Like `init_logging`, but allows specifying additional modules to hold at `warn`.
/// Logs go to stderr so the binary can stream output tables on stdout.
pub fn init_logging_with_exclusions(
    log_level: &str,
    log_format: &str,
    excluded_targets: &[String],
) {
    let filter = build_filter(log_level, excluded_targets);

    let subscriber = tracing_subscriber::registry().with(filter);

    if log_format == "json" {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_span_events(FmtSpan::CLOSE)
            .with_current_span(true)
            .with_target(true)
            .with_file(true)
            .with_line_number(true);
        let _ = subscriber.with(fmt_layer).try_init();
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(true)
            .with_file(false)
            .with_line_number(false);
        let _ = subscriber.with(fmt_layer).try_init();
    }

    tracing::info!(
        log_level = %log_level,
        log_format = %log_format,
        noise_filtered = NOISY_MODULES.len() + excluded_targets.len(),
        "Logging initialized"
    );
}

/// Generate a new run ID.
pub fn generate_run_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Generate a new short span ID for a stage of a run.
pub fn generate_span_id() -> String {
    uuid::Uuid::new_v4().to_string()[..8].to_string()
}

// ============================================================================
// Run Context
// ============================================================================

/// Context carried through one forecast run.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Unique id shared by every stage of the run
    pub run_id: String,
    /// Current stage span ID
    pub span_id: String,
    /// Parent stage span ID (if any)
    pub parent_span_id: Option<String>,
    /// Component name
    pub component: String,
    /// Wall-clock start of the run
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl RunContext {
    /// Create a new run context.
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            run_id: generate_run_id(),
            span_id: generate_span_id(),
            parent_span_id: None,
            component: component.into(),
            started_at: chrono::Utc::now(),
        }
    }

    /// Create a child context for a stage of the same run.
    pub fn child(&self, component: impl Into<String>) -> Self {
        Self {
            run_id: self.run_id.clone(),
            span_id: generate_span_id(),
            parent_span_id: Some(self.span_id.clone()),
            component: component.into(),
            started_at: self.started_at,
        }
    }

    /// Tracing span tagged with this context.
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!(
            "forecast",
            run_id = %self.run_id,
            span_id = %self.span_id,
            component = %self.component,
        )
    }

    /// Milliseconds elapsed since the run started.
    pub fn elapsed_ms(&self) -> i64 {
        (chrono::Utc::now() - self.started_at).num_milliseconds()
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new("seatcast")
    }
}
