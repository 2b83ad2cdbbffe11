//! Fuzz target: decoding of reply and worker-update messages.
//!
//! The input is split on NUL into correlation id, worker id, location and
//! body. Decoding must never panic, and the short worker id must be a
//! dash-free suffix of the full id.
#![no_main]

use libfuzzer_sys::fuzz_target;
use relay_core::{property, short_worker_id, Envelope, WorkResponse, WorkerHealth};

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let mut parts = text.split('\0');
    let correlation = parts.next().unwrap_or_default();
    let worker_id = parts.next().unwrap_or_default();
    let location = parts.next();
    let body = parts.next();

    let short = short_worker_id(worker_id);
    assert!(worker_id.ends_with(short));
    assert!(!short.contains('-'));

    let mut envelope = Envelope::new()
        .with_correlation_id(correlation)
        .with_property(property::WORKER_ID, worker_id)
        .with_property(property::TIMESTAMP, i64::try_from(data.len()).unwrap_or(i64::MAX));
    if let Some(location) = location {
        envelope = envelope.with_property(property::LOCATION, location);
    }
    if let Some(body) = body {
        envelope = envelope.with_body(body);
    }

    if let Ok(response) = WorkResponse::from_envelope(&envelope) {
        assert_eq!(response.worker_short_id, short);
    }
    let _ = WorkerHealth::from_envelope(&envelope);
});
