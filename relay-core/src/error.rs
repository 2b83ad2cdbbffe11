/// Errors produced by the `relay-core` crate.
///
/// Every variant describes a malformed inbound broker message. Callers log
/// and drop the message; none of these are fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum CoreError {
    /// A required application property was absent.
    #[error("missing message property '{name}'")]
    MissingProperty { name: &'static str },

    /// An application property was present but carried the wrong type.
    #[error("message property '{name}' must be a {expected}")]
    PropertyType {
        name: &'static str,
        expected: &'static str,
    },

    /// A reply arrived without a correlation id.
    #[error("reply message has no correlation id")]
    MissingCorrelationId,

    /// A reply arrived without a text body.
    #[error("reply message has no text body")]
    MissingBody,
}
