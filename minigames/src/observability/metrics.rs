//! Prometheus metrics.
//!
//! Every label value comes from a fixed enum (`GameKind`,
//! `EliminationReason`, `IgnoreReason`, ...) or from the known-category
//! list below, so chat input can never grow label cardinality.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::MinigamesError;
use crate::game::{CompletionReason, EliminationReason, IgnoreReason};
use crate::types::GameKind;

static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Error categories accepted as labels; anything else becomes `other`.
const KNOWN_CATEGORIES: [&str; 5] = ["transport", "decode", "config", "invariant", "roles"];

/// Buckets an error category into the known set.
#[must_use]
pub fn sanitize_category(category: &str) -> &str {
    if KNOWN_CATEGORIES.contains(&category) {
        category
    } else {
        "other"
    }
}

/// Installs the global recorder.
///
/// With `Some(port)` a Prometheus scrape endpoint listens on
/// `127.0.0.1:<port>`; with `None` metrics are recorded in-process only.
///
/// # Errors
///
/// Returns `MinigamesError::Io` if the recorder or listener cannot be
/// installed (e.g. port already in use).
pub fn init_metrics(port: Option<u16>) -> Result<(), MinigamesError> {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        tracing::debug!("metrics already initialized, skipping");
        return Ok(());
    }
    port.map_or_else(
        || PrometheusBuilder::new().install_recorder().map(|_| ()),
        |p| {
            PrometheusBuilder::new()
                .with_http_listener(([127, 0, 0, 1], p))
                .install()
        },
    )
    .map_err(|e| MinigamesError::Io(std::io::Error::other(e.to_string())))?;

    describe_metrics();
    Ok(())
}

fn describe_metrics() {
    describe_counter!(
        "minigames_inbound_events_total",
        "Inbound events routed to a session"
    );
    describe_counter!(
        "minigames_ignored_events_total",
        "Events dropped as policy no-ops"
    );
    describe_counter!(
        "minigames_sessions_started_total",
        "Sessions started"
    );
    describe_counter!(
        "minigames_sessions_completed_total",
        "Sessions completed, by reason"
    );
    describe_gauge!("minigames_sessions_active", "Sessions currently running");
    describe_histogram!(
        "minigames_session_duration_seconds",
        "Wall-clock session duration"
    );
    describe_counter!(
        "minigames_eliminations_total",
        "Participants eliminated, by reason"
    );
    describe_counter!(
        "minigames_commands_rejected_total",
        "Moderator commands refused"
    );
    describe_counter!("minigames_errors_total", "Errors by category");
}

/// Records an inbound event of the given kind.
pub fn record_inbound(kind: &'static str) {
    counter!("minigames_inbound_events_total", "kind" => kind).increment(1);
}

/// Records a policy no-op.
pub fn record_ignored(reason: IgnoreReason) {
    counter!("minigames_ignored_events_total", "reason" => reason.as_str()).increment(1);
}

/// Records a session start.
pub fn record_session_started(game: GameKind) {
    counter!("minigames_sessions_started_total", "game" => game.as_str()).increment(1);
}

/// Records a session completion and how long it ran.
pub fn record_session_completed(game: GameKind, reason: &CompletionReason, duration: Duration) {
    counter!(
        "minigames_sessions_completed_total",
        "game" => game.as_str(),
        "reason" => reason.as_str(),
    )
    .increment(1);
    histogram!("minigames_session_duration_seconds", "game" => game.as_str())
        .record(duration.as_secs_f64());
}

/// Sets the number of running sessions.
#[allow(clippy::cast_precision_loss)]
pub fn set_sessions_active(count: usize) {
    gauge!("minigames_sessions_active").set(count as f64);
}

/// Records an elimination.
pub fn record_elimination(game: GameKind, reason: EliminationReason) {
    counter!(
        "minigames_eliminations_total",
        "game" => game.as_str(),
        "reason" => reason.as_str(),
    )
    .increment(1);
}

/// Records a refused moderator command.
pub fn record_command_rejected(command: &'static str) {
    counter!("minigames_commands_rejected_total", "command" => command).increment(1);
}

/// Records an error by category.
pub fn record_error(category: &str) {
    counter!("minigames_errors_total", "category" => sanitize_category(category).to_owned())
        .increment(1);
}
