//! The gateway façade: request submission, response polling and the state
//! snapshot, plus the background tasks that feed them.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use relay_broker::{DispatchQueue, ReplyAddress, Transport};
use relay_core::{
    address, Envelope, GatewayState, InstanceId, RequestId, WorkRequest, WorkResponse,
    WorkerHealth,
};

use crate::error::GatewayError;
use crate::liveness::{run_sweeper, LivenessRegistry, DEFAULT_STALE_THRESHOLD, DEFAULT_SWEEP_INTERVAL};
use crate::store::{CorrelationStore, RequestLedger};

/// Startup parameters for [`Gateway::start`].
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct GatewaySettings {
    /// Prefix for every request id this process issues.
    pub instance_id: InstanceId,
    pub sweep_interval: Duration,
    pub stale_threshold: Duration,
}

impl GatewaySettings {
    /// Settings with the default liveness timings.
    #[must_use]
    pub fn new(instance_id: InstanceId) -> Self {
        Self {
            instance_id,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            stale_threshold: DEFAULT_STALE_THRESHOLD,
        }
    }

    /// Override the sweep period and staleness threshold.
    #[must_use]
    pub fn with_liveness(mut self, sweep_interval: Duration, stale_threshold: Duration) -> Self {
        self.sweep_interval = sweep_interval;
        self.stale_threshold = stale_threshold;
        self
    }
}

/// Shared state behind the HTTP routes.
#[derive(Debug)]
pub struct Gateway {
    instance_id: InstanceId,
    sequence: AtomicU64,
    ledger: RequestLedger,
    responses: CorrelationStore,
    workers: LivenessRegistry,
    dispatch: Arc<DispatchQueue>,
}

impl Gateway {
    /// A gateway publishing through `dispatch`, with no background tasks.
    #[must_use]
    pub fn new(instance_id: InstanceId, dispatch: Arc<DispatchQueue>) -> Self {
        Self {
            instance_id,
            sequence: AtomicU64::new(0),
            ledger: RequestLedger::new(),
            responses: CorrelationStore::new(),
            workers: LivenessRegistry::new(),
            dispatch,
        }
    }

    /// Attach the broker links and spawn the background tasks.
    ///
    /// Opens the `work-requests` sender, the `worker-updates` receiver and
    /// the dynamic reply receiver before returning, so a running gateway
    /// always knows its reply address.
    ///
    /// # Errors
    /// Returns [`GatewayError::Broker`] if any of the three links cannot be
    /// attached or the broker assigns no reply address.
    pub async fn start(
        transport: Arc<dyn Transport>,
        settings: GatewaySettings,
    ) -> Result<Arc<Self>, GatewayError> {
        let sender = transport.open_sender(address::WORK_REQUESTS).await?;
        let mut updates = transport.open_receiver(address::WORKER_UPDATES).await?;
        let reply = ReplyAddress::new();
        let mut replies = reply.negotiate(transport.as_ref()).await?;

        let GatewaySettings { instance_id, sweep_interval, stale_threshold } = settings;
        let dispatch = Arc::new(DispatchQueue::new(sender, reply));
        let gateway = Arc::new(Self::new(instance_id, Arc::clone(&dispatch)));

        tokio::spawn(dispatch.run());

        let replies_gateway = Arc::clone(&gateway);
        tokio::spawn(async move {
            // Links live as long as the connection behind the transport.
            let _transport = transport;
            while let Some(envelope) = replies.recv().await {
                replies_gateway.record_response(&envelope);
            }
            tracing::warn!(reply_to = replies.address(), "reply link closed");
        });

        let updates_gateway = Arc::clone(&gateway);
        tokio::spawn(async move {
            while let Some(envelope) = updates.recv().await {
                updates_gateway.record_health(&envelope);
            }
            tracing::warn!(address = address::WORKER_UPDATES, "worker updates link closed");
        });

        let sweeper_gateway = Arc::clone(&gateway);
        tokio::spawn(async move {
            run_sweeper(&sweeper_gateway.workers, sweep_interval, stale_threshold).await;
        });

        Ok(gateway)
    }

    /// Allocate a request id, record it and queue the request for dispatch.
    ///
    /// Returns at once; publishing happens when the reply address and send
    /// capacity allow.
    pub fn submit(&self, text: impl Into<String>, options: BTreeMap<String, bool>) -> RequestId {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let id = RequestId::new(&self.instance_id, sequence);
        self.ledger.record(&id);
        self.dispatch.enqueue(WorkRequest::new(id.clone(), text, options));
        id
    }

    /// The response recorded for `request_id`, if one has arrived.
    #[must_use]
    pub fn poll(&self, request_id: &str) -> Option<WorkResponse> {
        self.responses.lookup(request_id)
    }

    /// Copy of the ledger, the responses and the live workers.
    ///
    /// Each part is copied under its own lock; the three are not taken at
    /// one instant.
    #[must_use]
    pub fn snapshot(&self) -> GatewayState {
        GatewayState::new(self.ledger.snapshot(), self.responses.snapshot(), self.workers.snapshot())
    }

    /// Decode a reply and store it under its correlation id.
    ///
    /// Malformed replies are logged and dropped. Returns whether the reply
    /// was stored.
    pub fn record_response(&self, envelope: &Envelope) -> bool {
        match WorkResponse::from_envelope(envelope) {
            Ok(response) => {
                tracing::info!(
                    request_id = %response.request_id,
                    worker = %response.worker_short_id,
                    origin = %response.origin_label,
                    "received response"
                );
                self.responses.record(response);
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, message_id = ?envelope.message_id, "dropping malformed response");
                false
            }
        }
    }

    /// Decode a health report and record it.
    ///
    /// Malformed reports are logged and dropped. Returns whether the report
    /// was recorded.
    pub fn record_health(&self, envelope: &Envelope) -> bool {
        match WorkerHealth::from_envelope(envelope) {
            Ok(health) => {
                tracing::debug!(worker_id = %health.worker_id, "worker update");
                self.workers.record(health);
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed worker update");
                false
            }
        }
    }

    /// The worker registry.
    #[must_use]
    pub fn workers(&self) -> &LivenessRegistry {
        &self.workers
    }

    /// Requests still waiting to be published.
    #[must_use]
    pub fn pending_dispatch(&self) -> usize {
        self.dispatch.pending_len()
    }
}
