//! Core types for the relay work gateway.
//!
//! Defines the domain types shared by the broker and gateway crates: request
//! and worker identifiers, the backend-neutral message [`Envelope`], work
//! requests and their responses, worker health reports and the
//! [`GatewayState`] snapshot.

#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]

pub mod envelope;
pub mod error;
pub mod health;
pub mod id;
pub mod state;
pub mod work;

pub use envelope::{address, property, Envelope, PropertyValue};
pub use error::CoreError;
pub use health::WorkerHealth;
pub use id::{short_worker_id, InstanceId, RequestId};
pub use state::GatewayState;
pub use work::{text_options, WorkRequest, WorkResponse};
