//! Dynamic reply address negotiation.
//!
//! Replies come back on an address the broker generates for this
//! connection. Until it is known, nothing may be published: a request
//! without a valid reply-to could never be answered.

use std::sync::Arc;

use tokio::sync::watch;

use crate::{BrokerError, LinkReceiver, Transport};

/// Where the reply address handshake stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyAddressState {
    /// The dynamic receiver has not been attached yet.
    Unassigned,
    /// The broker assigned this address. Fixed for the connection lifetime.
    Assigned(String),
}

/// Shared handle to the connection's reply address.
#[derive(Debug, Clone)]
pub struct ReplyAddress {
    state: Arc<watch::Sender<ReplyAddressState>>,
}

impl ReplyAddress {
    /// A handle in the [`ReplyAddressState::Unassigned`] state.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = watch::channel(ReplyAddressState::Unassigned);
        Self { state: Arc::new(tx) }
    }

    /// The assigned address, or `None` while unassigned.
    #[must_use]
    pub fn address(&self) -> Option<String> {
        match &*self.state.borrow() {
            ReplyAddressState::Assigned(address) => Some(address.clone()),
            ReplyAddressState::Unassigned => None,
        }
    }

    /// Current state of the handshake.
    #[must_use]
    pub fn state(&self) -> ReplyAddressState {
        self.state.borrow().clone()
    }

    /// Record the broker-assigned address.
    ///
    /// # Errors
    /// Returns [`BrokerError::AddressAlreadyAssigned`] carrying the existing
    /// address if one was already set; the existing address is kept.
    pub fn assign(&self, address: impl Into<String>) -> Result<(), BrokerError> {
        let address = address.into();
        let mut existing = None;
        self.state.send_if_modified(|state| match state {
            ReplyAddressState::Unassigned => {
                *state = ReplyAddressState::Assigned(address.clone());
                true
            }
            ReplyAddressState::Assigned(current) => {
                existing = Some(current.clone());
                false
            }
        });
        match existing {
            Some(current) => Err(BrokerError::AddressAlreadyAssigned(current)),
            None => Ok(()),
        }
    }

    /// Wait until an address is assigned and return it.
    pub async fn assigned(&self) -> String {
        let mut rx = self.state.subscribe();
        loop {
            if let ReplyAddressState::Assigned(address) = &*rx.borrow_and_update() {
                return address.clone();
            }
            // `self` keeps the sender alive, so the channel never closes here.
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    /// Attach a dynamic receiver on `transport` and record its address.
    ///
    /// # Errors
    /// Propagates [`Transport::open_dynamic_receiver`] failures and
    /// [`BrokerError::AddressAlreadyAssigned`] if negotiation already ran.
    pub async fn negotiate(&self, transport: &dyn Transport) -> Result<LinkReceiver, BrokerError> {
        let receiver = transport.open_dynamic_receiver().await?;
        self.assign(receiver.address())?;
        tracing::info!(reply_to = receiver.address(), "reply address assigned");
        Ok(receiver)
    }
}

impl Default for ReplyAddress {
    fn default() -> Self {
        Self::new()
    }
}
