//! In-memory request ledger and correlation store.
//!
//! Nothing here survives a restart.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use indexmap::IndexMap;
use relay_core::{RequestId, WorkResponse};

/// Every request id this instance has issued, in allocation order.
#[derive(Debug, Default)]
pub struct RequestLedger {
    ids: RwLock<Vec<String>>,
}

impl RequestLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `id`.
    pub fn record(&self, id: &RequestId) {
        #[expect(clippy::expect_used, reason = "lock poisoning is unrecoverable")]
        self.ids.write().expect("request ledger write lock poisoned").push(id.as_str().to_owned());
    }

    /// A copy of all recorded ids.
    #[must_use]
    pub fn snapshot(&self) -> Vec<String> {
        #[expect(clippy::expect_used, reason = "lock poisoning is unrecoverable")]
        self.ids.read().expect("request ledger read lock poisoned").clone()
    }
}

/// Responses keyed by the request id they answer.
///
/// A later response for the same id replaces the earlier one and keeps its
/// position in arrival order.
#[derive(Debug, Default)]
pub struct CorrelationStore {
    responses: RwLock<IndexMap<String, WorkResponse>>,
}

impl CorrelationStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `response` under its request id, returning the one it replaced.
    pub fn record(&self, response: WorkResponse) -> Option<WorkResponse> {
        self.write().insert(response.request_id.clone(), response)
    }

    /// Look up the response for `request_id`.
    #[must_use]
    pub fn lookup(&self, request_id: &str) -> Option<WorkResponse> {
        self.read().get(request_id).cloned()
    }

    /// A copy of every stored response.
    #[must_use]
    pub fn snapshot(&self) -> IndexMap<String, WorkResponse> {
        self.read().clone()
    }

    fn read(&self) -> RwLockReadGuard<'_, IndexMap<String, WorkResponse>> {
        #[expect(clippy::expect_used, reason = "lock poisoning is unrecoverable")]
        self.responses.read().expect("correlation store read lock poisoned")
    }

    fn write(&self) -> RwLockWriteGuard<'_, IndexMap<String, WorkResponse>> {
        #[expect(clippy::expect_used, reason = "lock poisoning is unrecoverable")]
        self.responses.write().expect("correlation store write lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use relay_core::InstanceId;

    use super::*;

    #[test]
    fn ledger_keeps_allocation_order() {
        let ledger = RequestLedger::new();
        let instance = InstanceId::new("frontend-rust-ab12");
        for seq in 1..=3 {
            ledger.record(&RequestId::new(&instance, seq));
        }
        assert_eq!(
            ledger.snapshot(),
            ["frontend-rust-ab12/1", "frontend-rust-ab12/2", "frontend-rust-ab12/3"]
        );
    }

    #[test]
    fn lookup_misses_until_response_recorded() {
        let store = CorrelationStore::new();
        assert!(store.lookup("frontend-rust-ab12/1").is_none());
        assert!(store.snapshot().is_empty());

        store.record(WorkResponse::new("frontend-rust-ab12/1", "0001", "aws", "HELLO"));
        let found = store.lookup("frontend-rust-ab12/1");
        assert_eq!(found.map(|r| r.text), Some("HELLO".to_owned()));
    }

    #[test]
    fn duplicate_response_overwrites_in_place() {
        let store = CorrelationStore::new();
        store.record(WorkResponse::new("a/1", "0001", "aws", "first"));
        store.record(WorkResponse::new("a/2", "0001", "aws", "other"));
        let replaced = store.record(WorkResponse::new("a/1", "0002", "gcp", "second"));

        assert_eq!(replaced.map(|r| r.text), Some("first".to_owned()));
        let snapshot = store.snapshot();
        let keys: Vec<_> = snapshot.keys().cloned().collect();
        assert_eq!(keys, ["a/1", "a/2"]);
        assert_eq!(snapshot["a/1"].text, "second");
    }
}
