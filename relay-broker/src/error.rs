//! Error types for the broker crate.

/// Errors that can occur while talking to the message broker.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum BrokerError {
    /// The configured host, port or credentials do not form a valid URL.
    #[error("invalid broker url: {0}")]
    InvalidUrl(String),

    /// The broker could not be reached or rejected the credentials.
    #[error("failed to connect to broker at {host}:{port}: {reason}")]
    ConnectFailed { host: String, port: u16, reason: String },

    /// Attaching a sender or receiver link failed.
    #[error("failed to attach link for '{address}': {reason}")]
    LinkFailed { address: String, reason: String },

    /// The link task behind a sender or receiver has stopped.
    #[error("link for '{address}' is closed")]
    LinkClosed { address: String },

    /// Every credit of the send window is in use. A flow-control signal,
    /// not a failure: retry after the next capacity event.
    #[error("send queue is full")]
    QueueFull,

    /// The reply address was already negotiated for this connection.
    #[error("reply address already assigned: {0}")]
    AddressAlreadyAssigned(String),

    /// The broker refused or failed a delivery.
    #[error("send failed: {0}")]
    SendFailed(String),
}
