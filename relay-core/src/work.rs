use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::envelope::{property, Envelope};
use crate::error::CoreError;
use crate::id::{short_worker_id, RequestId};

/// A unit of work submitted over HTTP, waiting to be published.
///
/// Immutable once enqueued. The dispatch queue moves it out when it is
/// published; its id lives on in the gateway's request ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct WorkRequest {
    /// Unique id within the issuing gateway instance.
    pub id: RequestId,
    /// Text the worker operates on.
    pub payload: String,
    /// Named processing flags, e.g. `uppercase` and `reverse`.
    pub options: BTreeMap<String, bool>,
}

impl WorkRequest {
    /// Creates a request with the given flags.
    #[must_use]
    pub fn new(id: RequestId, payload: impl Into<String>, options: BTreeMap<String, bool>) -> Self {
        Self { id, payload: payload.into(), options }
    }

    /// Builds the broker message for this request.
    ///
    /// The message id is the request id so the worker can echo it back as
    /// the reply's correlation id.
    #[must_use]
    pub fn to_envelope(&self, address: &str, reply_to: &str) -> Envelope {
        let envelope = Envelope::new()
            .to(address)
            .with_message_id(self.id.as_str())
            .with_reply_to(reply_to)
            .with_body(self.payload.clone());
        self.options
            .iter()
            .fold(envelope, |env, (name, flag)| env.with_property(name.clone(), *flag))
    }
}

/// Builds the option map for the two flags the HTTP surface exposes.
#[must_use]
pub fn text_options(uppercase: bool, reverse: bool) -> BTreeMap<String, bool> {
    BTreeMap::from([
        (property::UPPERCASE.to_owned(), uppercase),
        (property::REVERSE.to_owned(), reverse),
    ])
}

/// A worker's reply to a [`WorkRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct WorkResponse {
    /// Id of the request this answers.
    pub request_id: String,
    /// Trailing segment of the replying worker's id.
    pub worker_short_id: String,
    /// Location or cloud tag reported by the worker.
    pub origin_label: String,
    /// Processed text.
    pub text: String,
}

impl WorkResponse {
    /// Creates a response from its parts.
    #[must_use]
    pub fn new(
        request_id: impl Into<String>,
        worker_short_id: impl Into<String>,
        origin_label: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            worker_short_id: worker_short_id.into(),
            origin_label: origin_label.into(),
            text: text.into(),
        }
    }

    /// Decodes a reply message.
    ///
    /// # Errors
    /// Returns a [`CoreError`] if the correlation id, body, `workerId` or
    /// `AMQ_LOCATION_KEY` is missing or mistyped.
    pub fn from_envelope(envelope: &Envelope) -> Result<Self, CoreError> {
        let request_id = envelope
            .correlation_id
            .as_deref()
            .ok_or(CoreError::MissingCorrelationId)?;
        let worker_id = envelope.str_property(property::WORKER_ID)?;
        let origin = envelope.str_property(property::LOCATION)?;
        let text = envelope.body.as_deref().ok_or(CoreError::MissingBody)?;
        Ok(Self::new(request_id, short_worker_id(worker_id), origin, text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{address, PropertyValue};
    use crate::id::InstanceId;

    fn reply() -> Envelope {
        Envelope::new()
            .with_correlation_id("frontend-rust-ab12/1")
            .with_property(property::WORKER_ID, "worker-cluster-a-0001")
            .with_property(property::LOCATION, "on-prem")
            .with_body("HELLO")
    }

    #[test]
    fn to_envelope_stamps_id_reply_to_and_flags() {
        let id = RequestId::new(&InstanceId::new("frontend-rust-ab12"), 3);
        let request = WorkRequest::new(id, "hello", text_options(true, false));
        let env = request.to_envelope(address::WORK_REQUESTS, "dynamic/1");

        assert_eq!(env.address.as_deref(), Some("work-requests"));
        assert_eq!(env.message_id.as_deref(), Some("frontend-rust-ab12/3"));
        assert_eq!(env.reply_to.as_deref(), Some("dynamic/1"));
        assert_eq!(env.body.as_deref(), Some("hello"));
        assert_eq!(env.properties.get("uppercase"), Some(&PropertyValue::Bool(true)));
        assert_eq!(env.properties.get("reverse"), Some(&PropertyValue::Bool(false)));
    }

    #[test]
    fn from_envelope_derives_short_worker_id() {
        let response = match WorkResponse::from_envelope(&reply()) {
            Ok(r) => r,
            Err(e) => panic!("valid reply rejected: {e}"),
        };
        assert_eq!(response.request_id, "frontend-rust-ab12/1");
        assert_eq!(response.worker_short_id, "0001");
        assert_eq!(response.origin_label, "on-prem");
        assert_eq!(response.text, "HELLO");
    }

    #[test]
    fn from_envelope_rejects_missing_correlation_id_and_body() {
        let mut env = reply();
        env.correlation_id = None;
        assert_eq!(WorkResponse::from_envelope(&env), Err(CoreError::MissingCorrelationId));

        let mut env = reply();
        env.body = None;
        assert_eq!(WorkResponse::from_envelope(&env), Err(CoreError::MissingBody));
    }

    #[test]
    fn work_response_serializes_camel_case() {
        let json = match serde_json::to_value(WorkResponse::new("r/1", "0001", "aws", "x")) {
            Ok(v) => v,
            Err(e) => panic!("serialization failed: {e}"),
        };
        assert_eq!(json["requestId"], "r/1");
        assert_eq!(json["workerShortId"], "0001");
        assert_eq!(json["originLabel"], "aws");
    }
}
