use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::health::WorkerHealth;
use crate::work::WorkResponse;

/// Read-only copy of everything the gateway knows, served by `/api/data`.
///
/// Maps keep arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct GatewayState {
    /// Every request id issued by this instance, in allocation order.
    pub request_ids: Vec<String>,
    /// Responses received so far, keyed by request id.
    pub responses: IndexMap<String, WorkResponse>,
    /// Workers that reported within the staleness threshold.
    pub workers: IndexMap<String, WorkerHealth>,
}

impl GatewayState {
    /// Assembles a snapshot from its three views.
    #[must_use]
    pub fn new(
        request_ids: Vec<String>,
        responses: IndexMap<String, WorkResponse>,
        workers: IndexMap<String, WorkerHealth>,
    ) -> Self {
        Self { request_ids, responses, workers }
    }
}
