//! Broker connection settings.

use url::Url;

use crate::BrokerError;

/// Default AMQP port.
pub const DEFAULT_PORT: u16 = 5672;

/// Default number of unsettled messages a sender may have in flight.
pub const DEFAULT_SEND_WINDOW: usize = 32;

/// Settings for connecting to the message broker.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct BrokerConfig {
    /// Broker host name or address.
    pub host: String,

    /// Broker port.
    pub port: u16,

    /// SASL PLAIN user name. Only used together with `password`.
    pub username: Option<String>,

    /// SASL PLAIN password. Only used together with `username`.
    pub password: Option<String>,

    /// AMQP container id announced on open.
    pub container_id: String,

    /// Credits per sender link before `publish` reports a full queue.
    pub send_window: usize,
}

impl BrokerConfig {
    /// Create a config for `host:port` with anonymous access and defaults.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            username: None,
            password: None,
            container_id: "relay".to_owned(),
            send_window: DEFAULT_SEND_WINDOW,
        }
    }

    /// Set SASL PLAIN credentials.
    #[must_use]
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Set the container id.
    #[must_use]
    pub fn with_container_id(mut self, container_id: impl Into<String>) -> Self {
        self.container_id = container_id.into();
        self
    }

    /// Set the send window. Values below 1 are raised to 1.
    #[must_use]
    pub fn with_send_window(mut self, send_window: usize) -> Self {
        self.send_window = send_window.max(1);
        self
    }

    /// Connection URL, with credentials embedded (percent-encoded) when
    /// both are set.
    ///
    /// # Errors
    /// Returns [`BrokerError::InvalidUrl`] if the host does not form a
    /// valid URL.
    pub fn url(&self) -> Result<Url, BrokerError> {
        let mut url = Url::parse(&format!("amqp://{}:{}", self.host, self.port))
            .map_err(|e| BrokerError::InvalidUrl(e.to_string()))?;
        if let (Some(user), Some(pass)) = (&self.username, &self.password) {
            url.set_username(user)
                .map_err(|()| BrokerError::InvalidUrl("cannot set username".to_owned()))?;
            url.set_password(Some(pass))
                .map_err(|()| BrokerError::InvalidUrl("cannot set password".to_owned()))?;
        }
        Ok(url)
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self::new("localhost", DEFAULT_PORT)
    }
}
