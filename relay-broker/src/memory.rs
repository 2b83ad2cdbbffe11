//! In-process broker backend.
//!
//! Each address is a queue with competing consumers: a message goes to one
//! attached receiver (round robin), or waits in a backlog until the first
//! receiver attaches. Dynamic receivers get `dynamic/<n>` addresses.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use relay_core::Envelope;
use tokio::sync::mpsc;

use crate::config::DEFAULT_SEND_WINDOW;
use crate::{BrokerError, LinkReceiver, LinkSender, Transport};

#[derive(Debug, Default)]
struct Queue {
    consumers: Vec<mpsc::UnboundedSender<Envelope>>,
    next: usize,
    backlog: VecDeque<Envelope>,
}

impl Queue {
    fn push(&mut self, mut envelope: Envelope) {
        self.consumers.retain(|c| !c.is_closed());
        while !self.consumers.is_empty() {
            let idx = self.next % self.consumers.len();
            self.next = self.next.wrapping_add(1);
            match self.consumers[idx].send(envelope) {
                Ok(()) => return,
                Err(mpsc::error::SendError(returned)) => {
                    envelope = returned;
                    self.consumers.remove(idx);
                }
            }
        }
        self.backlog.push_back(envelope);
    }

    fn attach(&mut self, consumer: mpsc::UnboundedSender<Envelope>) {
        while let Some(envelope) = self.backlog.pop_front() {
            if let Err(mpsc::error::SendError(returned)) = consumer.send(envelope) {
                self.backlog.push_front(returned);
                return;
            }
        }
        self.consumers.push(consumer);
    }
}

#[derive(Debug, Default)]
struct Routes {
    queues: HashMap<String, Queue>,
    next_dynamic: u64,
}

/// A broker living inside the process.
///
/// Cloning yields another handle to the same broker.
#[derive(Debug, Clone)]
pub struct MemoryBroker {
    routes: Arc<Mutex<Routes>>,
    send_window: usize,
}

impl MemoryBroker {
    /// Create an empty broker with the default send window.
    #[must_use]
    pub fn new() -> Self {
        Self::with_send_window(DEFAULT_SEND_WINDOW)
    }

    /// Create an empty broker whose sender links allow `send_window`
    /// in-flight messages.
    #[must_use]
    pub fn with_send_window(send_window: usize) -> Self {
        Self { routes: Arc::new(Mutex::new(Routes::default())), send_window: send_window.max(1) }
    }

    /// Put a message on `address` directly, as a remote peer would.
    pub fn deliver(&self, address: &str, envelope: Envelope) {
        self.lock_routes().queues.entry(address.to_owned()).or_default().push(envelope);
    }

    /// Number of messages waiting on `address` for a consumer.
    #[must_use]
    pub fn backlog_len(&self, address: &str) -> usize {
        self.lock_routes().queues.get(address).map_or(0, |q| q.backlog.len())
    }

    fn attach(&self, address: String) -> LinkReceiver {
        let (tx, receiver) = LinkReceiver::channel(address.clone());
        self.lock_routes().queues.entry(address).or_default().attach(tx);
        receiver
    }

    fn lock_routes(&self) -> MutexGuard<'_, Routes> {
        #[expect(clippy::expect_used, reason = "lock poisoning is unrecoverable")]
        self.routes.lock().expect("memory broker lock poisoned")
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MemoryBroker {
    async fn open_sender(&self, address: &str) -> Result<LinkSender, BrokerError> {
        let (sender, mut outgoing) = LinkSender::channel(address, self.send_window);
        let broker = self.clone();
        let link_address = address.to_owned();
        tokio::spawn(async move {
            while let Some(out) = outgoing.recv().await {
                let (envelope, credit) = out.into_parts();
                let target = envelope.address.clone().unwrap_or_else(|| link_address.clone());
                broker.deliver(&target, envelope);
                drop(credit);
            }
        });
        Ok(sender)
    }

    async fn open_dynamic_receiver(&self) -> Result<LinkReceiver, BrokerError> {
        let address = {
            let mut routes = self.lock_routes();
            let n = routes.next_dynamic;
            routes.next_dynamic += 1;
            format!("dynamic/{n}")
        };
        Ok(self.attach(address))
    }

    async fn open_receiver(&self, address: &str) -> Result<LinkReceiver, BrokerError> {
        Ok(self.attach(address.to_owned()))
    }
}
