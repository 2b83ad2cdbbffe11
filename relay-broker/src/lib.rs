//! Message broker plumbing for the relay work gateway.
//!
//! Provides the [`Transport`] abstraction with an AMQP 1.0 backend and an
//! in-process backend, flow-controlled sender links, the dynamic reply
//! address handshake and the outbound dispatch queue.

#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]

pub mod amqp;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod link;
pub mod memory;
pub mod reply;
pub mod transport;

pub use amqp::AmqpTransport;
pub use config::BrokerConfig;
pub use dispatch::DispatchQueue;
pub use error::BrokerError;
pub use link::{LinkReceiver, LinkSender};
pub use memory::MemoryBroker;
pub use reply::{ReplyAddress, ReplyAddressState};
pub use transport::Transport;
