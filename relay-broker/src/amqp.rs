//! AMQP 1.0 broker backend.
//!
//! One connection and one session per gateway. Every link gets its own task:
//! sender tasks settle deliveries one by one and return the credit after the
//! broker's disposition; receiver tasks accept each delivery and forward it
//! as an [`Envelope`].

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use fe2o3_amqp::connection::ConnectionHandle;
use fe2o3_amqp::session::SessionHandle;
use fe2o3_amqp::types::messaging::{
    AmqpValue, ApplicationProperties, Body, Message, MessageId, Properties, Source,
};
use fe2o3_amqp::types::primitives::{SimpleValue, Value};
use fe2o3_amqp::{Connection, Receiver, Sender, Session};
use relay_core::{Envelope, PropertyValue};
use tokio::sync::{mpsc, Mutex};

use crate::link::Outgoing;
use crate::{BrokerConfig, BrokerError, LinkReceiver, LinkSender, Transport};

/// AMQP 1.0 transport.
///
/// Dropping it closes the session and connection once every link task has
/// finished.
pub struct AmqpTransport {
    /// Kept so the connection outlives this handle's sessions.
    _connection: ConnectionHandle<()>,
    session: Mutex<SessionHandle<()>>,
    container_id: String,
    send_window: usize,
    link_seq: AtomicU64,
}

impl AmqpTransport {
    /// Open a connection and a session to the broker described by `config`.
    ///
    /// # Errors
    /// Returns [`BrokerError::ConnectFailed`] if the broker is unreachable,
    /// rejects the credentials or refuses the session.
    pub async fn connect(config: &BrokerConfig) -> Result<Self, BrokerError> {
        let connect_failed = |reason: String| BrokerError::ConnectFailed {
            host: config.host.clone(),
            port: config.port,
            reason,
        };

        let url = config.url()?;
        let mut connection = Connection::open(config.container_id.clone(), url.as_str())
            .await
            .map_err(|e| connect_failed(e.to_string()))?;
        let session = Session::begin(&mut connection)
            .await
            .map_err(|e| connect_failed(e.to_string()))?;

        tracing::info!(
            host = %config.host,
            port = config.port,
            container_id = %config.container_id,
            "connected to broker"
        );

        Ok(Self {
            _connection: connection,
            session: Mutex::new(session),
            container_id: config.container_id.clone(),
            send_window: config.send_window,
            link_seq: AtomicU64::new(0),
        })
    }

    fn link_name(&self, kind: &str) -> String {
        let n = self.link_seq.fetch_add(1, Ordering::Relaxed);
        format!("{}-{kind}-{n}", self.container_id)
    }
}

#[async_trait]
impl Transport for AmqpTransport {
    async fn open_sender(&self, address: &str) -> Result<LinkSender, BrokerError> {
        let name = self.link_name("sender");
        let link = {
            let mut session = self.session.lock().await;
            Sender::attach(&mut *session, name, address.to_owned())
                .await
                .map_err(|e| link_failed(address, &e))?
        };
        let (sender, outgoing) = LinkSender::channel(address, self.send_window);
        tokio::spawn(pump_sender(link, outgoing, address.to_owned()));
        Ok(sender)
    }

    async fn open_dynamic_receiver(&self) -> Result<LinkReceiver, BrokerError> {
        let name = self.link_name("replies");
        let link = {
            let mut session = self.session.lock().await;
            Receiver::builder()
                .name(name)
                .source(Source::builder().dynamic(true).build())
                .attach(&mut *session)
                .await
                .map_err(|e| link_failed("<dynamic>", &e))?
        };
        let Some(address) = link.source().as_ref().and_then(|s| s.address.clone()) else {
            return Err(BrokerError::LinkFailed {
                address: "<dynamic>".to_owned(),
                reason: "broker did not assign a source address".to_owned(),
            });
        };
        let (deliveries, receiver) = LinkReceiver::channel(address);
        tokio::spawn(pump_receiver(link, deliveries, receiver.address().to_owned()));
        Ok(receiver)
    }

    async fn open_receiver(&self, address: &str) -> Result<LinkReceiver, BrokerError> {
        let name = self.link_name("receiver");
        let link = {
            let mut session = self.session.lock().await;
            Receiver::attach(&mut *session, name, address.to_owned())
                .await
                .map_err(|e| link_failed(address, &e))?
        };
        let (deliveries, receiver) = LinkReceiver::channel(address);
        tokio::spawn(pump_receiver(link, deliveries, address.to_owned()));
        Ok(receiver)
    }
}

fn link_failed(address: &str, err: &dyn std::fmt::Display) -> BrokerError {
    BrokerError::LinkFailed { address: address.to_owned(), reason: err.to_string() }
}

/// Send each queued message and hold its credit until the broker settles it.
async fn pump_sender(mut link: Sender, mut outgoing: mpsc::UnboundedReceiver<Outgoing>, address: String) {
    while let Some(out) = outgoing.recv().await {
        let (envelope, credit) = out.into_parts();
        let message_id = envelope.message_id.clone().unwrap_or_default();
        match link.send(to_message(envelope)).await {
            Ok(outcome) => {
                if let Err(outcome) = outcome.accepted_or_else(|o| o) {
                    let err = BrokerError::SendFailed(format!("{outcome:?}"));
                    tracing::warn!(%address, %message_id, error = %err, "broker did not accept message");
                }
            }
            Err(e) => {
                let err = BrokerError::SendFailed(e.to_string());
                tracing::error!(%address, %message_id, error = %err, "closing sender link");
                drop(credit);
                discard_queued(&mut outgoing, &address);
                break;
            }
        }
        drop(credit);
    }
    let _ = link.close().await;
}

/// Stop accepting messages for a dead link and log everything still queued on it.
fn discard_queued(outgoing: &mut mpsc::UnboundedReceiver<Outgoing>, address: &str) -> usize {
    outgoing.close();
    let mut dropped = 0;
    while let Ok(out) = outgoing.try_recv() {
        let (envelope, _credit) = out.into_parts();
        let message_id = envelope.message_id.unwrap_or_default();
        tracing::error!(%address, %message_id, "dropping queued message, sender link is closed");
        dropped += 1;
    }
    dropped
}

/// Accept each delivery and forward it; stops when the link or the consumer goes away.
async fn pump_receiver(mut link: Receiver, deliveries: mpsc::UnboundedSender<Envelope>, address: String) {
    loop {
        let delivery = match link.recv::<Body<Value>>().await {
            Ok(delivery) => delivery,
            Err(e) => {
                tracing::error!(%address, error = %e, "receive failed, closing link");
                break;
            }
        };
        if let Err(e) = link.accept(&delivery).await {
            tracing::warn!(%address, error = %e, "failed to accept delivery");
        }
        if deliveries.send(from_message(delivery.into_message())).is_err() {
            break;
        }
    }
    let _ = link.close().await;
}

fn to_message(envelope: Envelope) -> Message<AmqpValue<String>> {
    let mut properties = Properties::builder();
    if let Some(id) = envelope.message_id {
        properties = properties.message_id(MessageId::String(id));
    }
    if let Some(id) = envelope.correlation_id {
        properties = properties.correlation_id(MessageId::String(id));
    }
    if let Some(to) = envelope.address {
        properties = properties.to(to);
    }
    if let Some(reply_to) = envelope.reply_to {
        properties = properties.reply_to(reply_to);
    }

    let application_properties = envelope
        .properties
        .into_iter()
        .fold(ApplicationProperties::builder(), |props, (name, value)| {
            props.insert(name, to_simple(value))
        })
        .build();

    Message::builder()
        .properties(properties.build())
        .application_properties(application_properties)
        .value(envelope.body.unwrap_or_default())
        .build()
}

fn from_message(message: Message<Body<Value>>) -> Envelope {
    let mut envelope = Envelope::new();
    if let Some(props) = message.properties {
        envelope.address = props.to;
        envelope.reply_to = props.reply_to;
        envelope.message_id = props.message_id.and_then(message_id_text);
        envelope.correlation_id = props.correlation_id.and_then(message_id_text);
    }
    if let Some(app) = message.application_properties {
        for (name, value) in app.0.iter() {
            if let Some(value) = from_simple(value) {
                envelope.properties.insert(name.clone(), value);
            }
        }
    }
    if let Body::Value(AmqpValue(Value::String(text))) = message.body {
        envelope.body = Some(text);
    }
    envelope
}

fn message_id_text(id: MessageId) -> Option<String> {
    match id {
        MessageId::String(s) => Some(s),
        MessageId::Ulong(n) => Some(n.to_string()),
        _ => None,
    }
}

fn to_simple(value: PropertyValue) -> SimpleValue {
    match value {
        PropertyValue::Bool(b) => SimpleValue::Bool(b),
        PropertyValue::Long(v) => SimpleValue::Long(v),
        PropertyValue::String(s) => SimpleValue::String(s),
    }
}

/// Workers send counters as any integer width; everything integral maps to `Long`.
fn from_simple(value: &SimpleValue) -> Option<PropertyValue> {
    let long = match value {
        SimpleValue::Bool(b) => return Some(PropertyValue::Bool(*b)),
        SimpleValue::String(s) => return Some(PropertyValue::String(s.clone())),
        SimpleValue::Long(v) => *v,
        SimpleValue::Int(v) => i64::from(*v),
        SimpleValue::Short(v) => i64::from(*v),
        SimpleValue::Byte(v) => i64::from(*v),
        SimpleValue::Uint(v) => i64::from(*v),
        SimpleValue::Ushort(v) => i64::from(*v),
        SimpleValue::Ubyte(v) => i64::from(*v),
        SimpleValue::Ulong(v) => i64::try_from(*v).ok()?,
        _ => return None,
    };
    Some(PropertyValue::Long(long))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discard_queued_drains_and_closes_the_link_queue() {
        let (sender, mut outgoing) = LinkSender::channel("work-requests", 4);
        for id in ["frontend-rust-ab12/1", "frontend-rust-ab12/2"] {
            assert!(sender.publish(Envelope::new().with_message_id(id)).is_ok());
        }

        assert_eq!(discard_queued(&mut outgoing, "work-requests"), 2);
        assert!(!sender.has_capacity(), "closed queue reports no capacity");
        assert!(matches!(sender.publish(Envelope::new()), Err(BrokerError::LinkClosed { .. })));
    }

    #[test]
    fn from_simple_widens_integers_and_skips_others() {
        assert_eq!(from_simple(&SimpleValue::Int(7)), Some(PropertyValue::Long(7)));
        assert_eq!(from_simple(&SimpleValue::Ulong(9)), Some(PropertyValue::Long(9)));
        assert_eq!(from_simple(&SimpleValue::Ulong(u64::MAX)), None);
        assert_eq!(from_simple(&SimpleValue::Bool(true)), Some(PropertyValue::Bool(true)));
        assert_eq!(from_simple(&SimpleValue::Double(1.5.into())), None);
    }

    #[test]
    fn to_message_carries_ids_and_properties() {
        let envelope = Envelope::new()
            .to("work-requests")
            .with_message_id("frontend-rust-ab12/1")
            .with_reply_to("dynamic/0")
            .with_property("uppercase", true)
            .with_body("hello");
        let message = to_message(envelope);

        let Some(props) = message.properties else { panic!("properties missing") };
        assert_eq!(props.message_id, Some(MessageId::String("frontend-rust-ab12/1".to_owned())));
        assert_eq!(props.reply_to.as_deref(), Some("dynamic/0"));
        assert_eq!(props.to.as_deref(), Some("work-requests"));
        assert_eq!(message.body, AmqpValue("hello".to_owned()));
    }

    #[test]
    fn from_message_reads_string_correlation_id_and_body() {
        let message = Message::builder()
            .properties(
                Properties::builder()
                    .correlation_id(MessageId::String("frontend-rust-ab12/1".to_owned()))
                    .build(),
            )
            .application_properties(
                ApplicationProperties::builder()
                    .insert("workerId", SimpleValue::String("worker-a-0001".to_owned()))
                    .insert("timestamp", SimpleValue::Long(5))
                    .build(),
            )
            .body(Body::Value(AmqpValue(Value::String("HELLO".to_owned()))))
            .build();

        let envelope = from_message(message);
        assert_eq!(envelope.correlation_id.as_deref(), Some("frontend-rust-ab12/1"));
        assert_eq!(envelope.body.as_deref(), Some("HELLO"));
        assert_eq!(envelope.properties.get("timestamp"), Some(&PropertyValue::Long(5)));
    }
}
