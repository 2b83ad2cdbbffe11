//! Backend-neutral representation of a broker message.
//!
//! Transport backends translate between their native message format and
//! [`Envelope`]; everything above the transport only sees envelopes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Well-known broker addresses.
pub mod address {
    /// Shared queue that workers consume work requests from.
    pub const WORK_REQUESTS: &str = "work-requests";
    /// Topic on which workers publish periodic health updates.
    pub const WORKER_UPDATES: &str = "worker-updates";
}

/// Application property names used on the wire.
pub mod property {
    pub const UPPERCASE: &str = "uppercase";
    pub const REVERSE: &str = "reverse";
    pub const WORKER_ID: &str = "workerId";
    pub const LOCATION: &str = "AMQ_LOCATION_KEY";
    pub const TIMESTAMP: &str = "timestamp";
    pub const REQUESTS_PROCESSED: &str = "requestsProcessed";
    pub const PROCESSING_ERRORS: &str = "processingErrors";
}

/// A typed application property value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Long(i64),
    String(String),
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        Self::Long(value)
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

/// A message as it travels to or from the broker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Destination address; `None` means the sending link's address.
    pub address: Option<String>,
    pub message_id: Option<String>,
    pub correlation_id: Option<String>,
    pub reply_to: Option<String>,
    pub properties: BTreeMap<String, PropertyValue>,
    pub body: Option<String>,
}

impl Envelope {
    /// Creates an empty envelope.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the destination address.
    #[must_use]
    pub fn to(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Sets the message id.
    #[must_use]
    pub fn with_message_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = Some(id.into());
        self
    }

    /// Sets the correlation id.
    #[must_use]
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    /// Sets the reply-to address.
    #[must_use]
    pub fn with_reply_to(mut self, address: impl Into<String>) -> Self {
        self.reply_to = Some(address.into());
        self
    }

    /// Adds an application property, replacing any previous value.
    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Sets the text body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Returns a required string property.
    ///
    /// # Errors
    /// Returns [`CoreError::MissingProperty`] if absent or
    /// [`CoreError::PropertyType`] if not a string.
    pub fn str_property(&self, name: &'static str) -> Result<&str, CoreError> {
        match self.properties.get(name) {
            Some(PropertyValue::String(s)) => Ok(s),
            Some(_) => Err(CoreError::PropertyType { name, expected: "string" }),
            None => Err(CoreError::MissingProperty { name }),
        }
    }

    /// Returns a required integer property.
    ///
    /// # Errors
    /// Returns [`CoreError::MissingProperty`] if absent or
    /// [`CoreError::PropertyType`] if not an integer.
    pub fn long_property(&self, name: &'static str) -> Result<i64, CoreError> {
        match self.properties.get(name) {
            Some(PropertyValue::Long(v)) => Ok(*v),
            Some(_) => Err(CoreError::PropertyType { name, expected: "long" }),
            None => Err(CoreError::MissingProperty { name }),
        }
    }

    /// Returns a boolean property, `false` when absent or not a boolean.
    #[must_use]
    pub fn flag(&self, name: &str) -> bool {
        matches!(self.properties.get(name), Some(PropertyValue::Bool(true)))
    }
}
