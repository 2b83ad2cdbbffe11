//! Broker transport abstraction trait.
//!
//! Allows swapping between the AMQP backend and the in-process broker
//! without changing dispatch or correlation logic.

use async_trait::async_trait;

use crate::{BrokerError, LinkReceiver, LinkSender};

/// An open connection to a message broker.
///
/// Connecting is backend specific (see `AmqpTransport::connect`); once
/// connected, every backend hands out the same [`LinkSender`] and
/// [`LinkReceiver`] types. Deliveries are pushed into receivers from the
/// backend's own link tasks.
///
/// Implementations must be `Send + Sync` to allow use across async tasks.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Attach a sender link publishing to `address`.
    ///
    /// # Errors
    /// Returns [`BrokerError::LinkFailed`] if the broker refuses the link.
    async fn open_sender(&self, address: &str) -> Result<LinkSender, BrokerError>;

    /// Attach a receiver whose source address the broker generates.
    ///
    /// Resolves once the broker has assigned the address; read it from
    /// [`LinkReceiver::address`].
    ///
    /// # Errors
    /// Returns [`BrokerError::LinkFailed`] if the link is refused or the
    /// broker does not return an address.
    async fn open_dynamic_receiver(&self) -> Result<LinkReceiver, BrokerError>;

    /// Attach a receiver consuming from `address`.
    ///
    /// # Errors
    /// Returns [`BrokerError::LinkFailed`] if the broker refuses the link.
    async fn open_receiver(&self, address: &str) -> Result<LinkReceiver, BrokerError>;
}
