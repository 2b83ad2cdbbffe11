use serde::{Deserialize, Serialize};

use crate::envelope::{property, Envelope};
use crate::error::CoreError;

/// The latest health report received from a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct WorkerHealth {
    /// Full worker id, e.g. `worker-cluster-a-0001`.
    pub worker_id: String,
    /// Location or cloud tag reported by the worker.
    pub origin_label: String,
    /// Worker-side timestamp of the report, epoch milliseconds.
    pub last_seen_epoch_millis: i64,
    pub requests_processed: i64,
    pub processing_errors: i64,
}

impl WorkerHealth {
    /// Creates a health report with zeroed counters.
    #[must_use]
    pub fn new(
        worker_id: impl Into<String>,
        origin_label: impl Into<String>,
        last_seen_epoch_millis: i64,
    ) -> Self {
        Self {
            worker_id: worker_id.into(),
            origin_label: origin_label.into(),
            last_seen_epoch_millis,
            requests_processed: 0,
            processing_errors: 0,
        }
    }

    /// Decodes a `worker-updates` message.
    ///
    /// # Errors
    /// Returns a [`CoreError`] if any of `workerId`, `AMQ_LOCATION_KEY`,
    /// `timestamp`, `requestsProcessed` or `processingErrors` is missing or
    /// mistyped.
    pub fn from_envelope(envelope: &Envelope) -> Result<Self, CoreError> {
        Ok(Self {
            worker_id: envelope.str_property(property::WORKER_ID)?.to_owned(),
            origin_label: envelope.str_property(property::LOCATION)?.to_owned(),
            last_seen_epoch_millis: envelope.long_property(property::TIMESTAMP)?,
            requests_processed: envelope.long_property(property::REQUESTS_PROCESSED)?,
            processing_errors: envelope.long_property(property::PROCESSING_ERRORS)?,
        })
    }

    /// Returns `true` when the report is older than `threshold_millis` at `now_millis`.
    ///
    /// The comparison is strict: a report exactly `threshold_millis` old is
    /// still live.
    #[must_use]
    pub fn is_stale(&self, now_millis: i64, threshold_millis: i64) -> bool {
        now_millis.saturating_sub(self.last_seen_epoch_millis) > threshold_millis
    }
}
