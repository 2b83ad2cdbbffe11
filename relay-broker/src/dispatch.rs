//! Outbound dispatch queue feeding the request sender link.
//!
//! Work requests wait here until two conditions hold at once: the reply
//! address is assigned and the sender has a free credit. The drain runs on
//! every enqueue, on address assignment and on every credit release.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use relay_core::WorkRequest;

use crate::{BrokerError, LinkSender, ReplyAddress};

/// FIFO of unpublished work requests.
///
/// All operations are safe to call concurrently. The pending-queue lock is
/// held for a whole drain pass, so overlapping drains never publish the
/// same request twice.
#[derive(Debug)]
pub struct DispatchQueue {
    sender: LinkSender,
    reply: ReplyAddress,
    pending: Mutex<VecDeque<WorkRequest>>,
}

impl DispatchQueue {
    /// Create an empty queue publishing through `sender`.
    #[must_use]
    pub fn new(sender: LinkSender, reply: ReplyAddress) -> Self {
        Self { sender, reply, pending: Mutex::new(VecDeque::new()) }
    }

    /// Append a request and try to drain. Returns how many requests were
    /// published by that drain.
    pub fn enqueue(&self, request: WorkRequest) -> usize {
        self.lock_pending().push_back(request);
        self.drain()
    }

    /// Publish queued requests while the reply address is known and the
    /// sender has capacity. Returns how many were published.
    ///
    /// A no-op while the reply address is unassigned. A full send window
    /// stops the pass with the request kept at the head; any other publish
    /// failure drops that request with an error log.
    pub fn drain(&self) -> usize {
        let Some(reply_to) = self.reply.address() else {
            return 0;
        };
        let mut pending = self.lock_pending();
        let mut sent = 0;
        while let Some(request) = pending.pop_front() {
            let envelope = request.to_envelope(self.sender.address(), &reply_to);
            match self.sender.publish(envelope) {
                Ok(()) => {
                    sent += 1;
                    tracing::debug!(request_id = %request.id, %reply_to, "sent work request");
                }
                Err(BrokerError::QueueFull) => {
                    pending.push_front(request);
                    break;
                }
                Err(e) => {
                    tracing::error!(request_id = %request.id, error = %e, "dropping work request");
                }
            }
        }
        sent
    }

    /// Number of requests waiting to be published.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.lock_pending().len()
    }

    /// Drive the drain from address assignment and credit releases.
    ///
    /// Runs until the task is aborted.
    pub async fn run(self: Arc<Self>) {
        self.reply.assigned().await;
        self.drain();
        loop {
            self.sender.capacity_available().await;
            self.drain();
        }
    }

    fn lock_pending(&self) -> MutexGuard<'_, VecDeque<WorkRequest>> {
        #[expect(clippy::expect_used, reason = "lock poisoning is unrecoverable")]
        self.pending.lock().expect("dispatch queue lock poisoned")
    }
}
