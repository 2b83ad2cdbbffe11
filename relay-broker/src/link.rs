//! Backend-neutral sender and receiver links.
//!
//! A [`LinkSender`] owns a credit window: each published message holds one
//! credit until the backend's link task reports the delivery settled. When
//! no credit is free, [`LinkSender::publish`] fails fast with
//! [`BrokerError::QueueFull`] and callers wait for
//! [`LinkSender::capacity_available`].

use std::sync::Arc;

use relay_core::Envelope;
use tokio::sync::{mpsc, Notify, OwnedSemaphorePermit, Semaphore, TryAcquireError};

use crate::BrokerError;

/// One in-flight credit. Dropping it returns the credit and wakes the
/// capacity listener.
#[derive(Debug)]
pub struct Credit {
    permit: Option<OwnedSemaphorePermit>,
    released: Arc<Notify>,
}

impl Drop for Credit {
    fn drop(&mut self) {
        // Release before notifying so the woken drain sees the free credit.
        drop(self.permit.take());
        self.released.notify_one();
    }
}

/// A published message on its way to the backend link task.
#[derive(Debug)]
pub struct Outgoing {
    envelope: Envelope,
    credit: Credit,
}

impl Outgoing {
    /// Splits into the message and its credit. Drop the credit once the
    /// broker has settled the delivery.
    #[must_use]
    pub fn into_parts(self) -> (Envelope, Credit) {
        (self.envelope, self.credit)
    }
}

/// The publishing half of a link.
#[derive(Debug, Clone)]
pub struct LinkSender {
    address: Arc<str>,
    outgoing: mpsc::UnboundedSender<Outgoing>,
    credits: Arc<Semaphore>,
    released: Arc<Notify>,
}

impl LinkSender {
    /// Create a sender with `window` credits plus the queue its link task
    /// consumes.
    #[must_use]
    pub fn channel(address: &str, window: usize) -> (Self, mpsc::UnboundedReceiver<Outgoing>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sender = Self {
            address: Arc::from(address),
            outgoing: tx,
            credits: Arc::new(Semaphore::new(window.max(1))),
            released: Arc::new(Notify::new()),
        };
        (sender, rx)
    }

    /// The address this link publishes to.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Hand a message to the link without waiting.
    ///
    /// # Errors
    /// Returns [`BrokerError::QueueFull`] when the send window is exhausted
    /// and [`BrokerError::LinkClosed`] when the link task has stopped.
    pub fn publish(&self, envelope: Envelope) -> Result<(), BrokerError> {
        let permit = match Arc::clone(&self.credits).try_acquire_owned() {
            Ok(permit) => permit,
            Err(TryAcquireError::NoPermits) => return Err(BrokerError::QueueFull),
            Err(TryAcquireError::Closed) => return Err(self.closed()),
        };
        let credit = Credit { permit: Some(permit), released: Arc::clone(&self.released) };
        self.outgoing
            .send(Outgoing { envelope, credit })
            .map_err(|_| self.closed())
    }

    /// Whether a credit is free and the link is still open.
    #[must_use]
    pub fn has_capacity(&self) -> bool {
        self.credits.available_permits() > 0 && !self.outgoing.is_closed()
    }

    /// Resolves after the next credit is returned.
    ///
    /// A release that happens while nobody is waiting is remembered, so a
    /// single listener never misses one.
    pub async fn capacity_available(&self) {
        self.released.notified().await;
    }

    fn closed(&self) -> BrokerError {
        BrokerError::LinkClosed { address: self.address.to_string() }
    }
}

/// The consuming half of a link.
#[derive(Debug)]
pub struct LinkReceiver {
    address: String,
    deliveries: mpsc::UnboundedReceiver<Envelope>,
}

impl LinkReceiver {
    /// Create a receiver bound to `address` plus the sender its link task
    /// feeds.
    #[must_use]
    pub fn channel(address: impl Into<String>) -> (mpsc::UnboundedSender<Envelope>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { address: address.into(), deliveries: rx })
    }

    /// The address this link consumes from. For a dynamic link this is the
    /// broker-assigned address.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Next delivered message, or `None` once the link is gone.
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.deliveries.recv().await
    }
}
