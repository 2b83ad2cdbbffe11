//! HTTP front end of the relay work gateway.
//!
//! Accepts text-processing requests over HTTP, forwards them to workers
//! through the broker, correlates the replies and tracks worker liveness.

#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]

pub mod config;
pub mod error;
pub mod gateway;
pub mod liveness;
pub mod routes;
pub mod store;

pub use config::{ConfigError, GatewayConfig};
pub use error::GatewayError;
pub use gateway::{Gateway, GatewaySettings};
