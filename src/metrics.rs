//! Vendor-agnostic metrics for PDP calls via a pluggable sink.
//!
//! Install one [`MetricsSink`] at startup with [`set_sink`]; every single
//! check, bulk check and resync trigger is then reported to it. Without a
//! sink the events are dropped.
//!
//! **Note:** only available with the `observability` feature.
//!
//! ```ignore
//! use pdp_client::metrics::{CheckOutcome, CheckStats, MetricsSink, set_sink};
//! use std::sync::atomic::{AtomicU64, Ordering};
//! use std::sync::Arc;
//!
//! #[derive(Default)]
//! struct DenyCounter(AtomicU64);
//!
//! impl MetricsSink for DenyCounter {
//!     fn on_check(&self, stats: &CheckStats) {
//!         if stats.outcome == CheckOutcome::Deny {
//!             self.0.fetch_add(1, Ordering::Relaxed);
//!         }
//!     }
//! }
//!
//! set_sink(Arc::new(DenyCounter::default()));
//! ```

use serde::Serialize;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use strum_macros::{AsRefStr, Display};
use tracing::warn;

use crate::cache::TriggerTarget;
use crate::error::PdpError;

/// How a check ended, from the caller's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CheckOutcome {
    Allow,
    Deny,
    /// The PDP could not be reached, timed out or the call was cancelled.
    ConnectionError,
    /// The PDP answered with a non-200 or an unusable body.
    ResponseError,
    /// Failed before any I/O.
    InvalidInput,
}

impl CheckOutcome {
    pub(crate) fn from_error(err: &PdpError) -> Self {
        if err.is_connection_error() {
            CheckOutcome::ConnectionError
        } else if err.is_response_error() {
            CheckOutcome::ResponseError
        } else {
            CheckOutcome::InvalidInput
        }
    }
}

/// One single-check round trip, passed to [`MetricsSink::on_check`].
#[derive(Debug, Clone, Serialize)]
pub struct CheckStats {
    pub duration: Duration,
    pub outcome: CheckOutcome,
    pub action: String,
    /// Resource type only; keys are unbounded and unsuitable as labels.
    pub resource_type: String,
}

/// One bulk round trip. `allowed` is only meaningful when `outcome` is not
/// an error.
#[derive(Debug, Clone, Serialize)]
pub struct BulkCheckStats {
    pub duration: Duration,
    /// `Allow` when the batch decoded, otherwise the error class.
    pub outcome: CheckOutcome,
    pub batch_size: usize,
    pub allowed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TriggerStats {
    pub duration: Duration,
    pub target: TriggerTarget,
    pub accepted: bool,
}

/// Consumer of PDP call metrics.
///
/// Called synchronously on the request path after each call completes, so
/// implementations must not block. Only `on_check` is required.
pub trait MetricsSink: Send + Sync {
    fn on_check(&self, stats: &CheckStats);

    fn on_bulk_check(&self, _stats: &BulkCheckStats) {}

    fn on_trigger(&self, _stats: &TriggerStats) {}
}

static SINK: OnceLock<Arc<dyn MetricsSink>> = OnceLock::new();

/// Set the global metrics sink.
///
/// The sink can be installed once; later calls are ignored with a warning.
/// Events from calls that finish before a sink is installed are dropped.
pub fn set_sink(sink: Arc<dyn MetricsSink>) {
    if SINK.set(sink).is_err() {
        warn!(
            event = "Metrics",
            phase = "SetSink",
            "Metrics sink was already initialized; ignoring set_sink"
        );
    }
}

pub(crate) fn record_check(
    result: Result<bool, &PdpError>,
    duration: Duration,
    action: &str,
    resource_type: &str,
) {
    let Some(sink) = SINK.get() else { return };
    let outcome = match result {
        Ok(true) => CheckOutcome::Allow,
        Ok(false) => CheckOutcome::Deny,
        Err(err) => CheckOutcome::from_error(err),
    };
    sink.on_check(&CheckStats {
        duration,
        outcome,
        action: action.to_string(),
        resource_type: resource_type.to_string(),
    });
}

pub(crate) fn record_bulk_check(
    result: Result<&[bool], &PdpError>,
    batch_size: usize,
    duration: Duration,
) {
    let Some(sink) = SINK.get() else { return };
    let (outcome, allowed) = match result {
        Ok(decisions) => (
            CheckOutcome::Allow,
            decisions.iter().filter(|allow| **allow).count(),
        ),
        Err(err) => (CheckOutcome::from_error(err), 0),
    };
    sink.on_bulk_check(&BulkCheckStats {
        duration,
        outcome,
        batch_size,
        allowed,
    });
}

pub(crate) fn record_trigger(target: TriggerTarget, accepted: bool, duration: Duration) {
    let Some(sink) = SINK.get() else { return };
    sink.on_trigger(&TriggerStats {
        duration,
        target,
        accepted,
    });
}
