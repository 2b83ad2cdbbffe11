//! End-to-end pipeline tests over the in-process broker.
//!
//! A simulated worker consumes `work-requests`, applies the text options and
//! replies to the request's reply-to address, the way a real worker does.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::Response,
    Router,
};
use relay_broker::{MemoryBroker, Transport};
use relay_core::{address, property, Envelope, InstanceId};
use relay_gateway::{liveness::now_millis, routes::create_router, Gateway, GatewaySettings};
use tokio::task::JoinHandle;
use tower::ServiceExt;

const WORKER_ID: &str = "worker-cluster-a-0001";

/// Process requests the way the workers do until the link closes.
fn spawn_worker(broker: &MemoryBroker) -> JoinHandle<()> {
    let broker = broker.clone();
    tokio::spawn(async move {
        let mut requests = match broker.open_receiver(address::WORK_REQUESTS).await {
            Ok(r) => r,
            Err(e) => panic!("worker attach failed: {e}"),
        };
        while let Some(request) = requests.recv().await {
            let mut text = request.body.clone().unwrap_or_default();
            if request.flag(property::UPPERCASE) {
                text = text.to_uppercase();
            }
            if request.flag(property::REVERSE) {
                text = text.chars().rev().collect();
            }
            let (Some(reply_to), Some(id)) = (request.reply_to, request.message_id) else {
                continue;
            };
            let reply = Envelope::new()
                .with_correlation_id(id)
                .with_property(property::WORKER_ID, WORKER_ID)
                .with_property(property::LOCATION, "aws")
                .with_body(text);
            broker.deliver(&reply_to, reply);
        }
    })
}

fn health_update(worker_id: &str, timestamp: i64) -> Envelope {
    Envelope::new()
        .with_property(property::WORKER_ID, worker_id)
        .with_property(property::LOCATION, "gcp")
        .with_property(property::TIMESTAMP, timestamp)
        .with_property(property::REQUESTS_PROCESSED, 7_i64)
        .with_property(property::PROCESSING_ERRORS, 0_i64)
}

async fn start(broker: &MemoryBroker, settings: GatewaySettings) -> (Arc<Gateway>, Router) {
    let transport: Arc<dyn Transport> = Arc::new(broker.clone());
    match Gateway::start(transport, settings).await {
        Ok(gateway) => {
            let app = create_router(Arc::clone(&gateway));
            (gateway, app)
        }
        Err(e) => panic!("gateway failed to start: {e}"),
    }
}

fn settings() -> GatewaySettings {
    GatewaySettings::new(InstanceId::new("frontend-rust-ab12"))
}

async fn call(app: &Router, req: Request<Body>) -> Response {
    match app.clone().oneshot(req).await {
        Ok(r) => r,
        Err(e) => panic!("handler error: {e}"),
    }
}

fn get(uri: &str) -> Request<Body> {
    match Request::builder().uri(uri).body(Body::empty()) {
        Ok(r) => r,
        Err(e) => panic!("failed to build request: {e}"),
    }
}

async fn send(app: &Router, body: &str) -> String {
    let req = match Request::builder()
        .method("POST")
        .uri("/api/send-request")
        .body(Body::from(body.to_owned()))
    {
        Ok(r) => r,
        Err(e) => panic!("failed to build request: {e}"),
    };
    let resp = call(app, req).await;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    match String::from_utf8(body_bytes(resp).await) {
        Ok(id) => id,
        Err(e) => panic!("request id is not UTF-8: {e}"),
    }
}

async fn body_bytes(resp: Response) -> Vec<u8> {
    match axum::body::to_bytes(resp.into_body(), 64 * 1024).await {
        Ok(b) => b.to_vec(),
        Err(e) => panic!("failed to read body: {e}"),
    }
}

async fn body_json(resp: Response) -> serde_json::Value {
    let bytes = body_bytes(resp).await;
    match serde_json::from_slice(&bytes) {
        Ok(v) => v,
        Err(e) => panic!("invalid JSON: {e}"),
    }
}

/// Poll `/api/receive-response` until it answers 200.
async fn await_response(app: &Router, id: &str) -> serde_json::Value {
    let uri = format!("/api/receive-response?request={id}");
    for _ in 0..200 {
        let resp = call(app, get(&uri)).await;
        if resp.status() == StatusCode::OK {
            return body_json(resp).await;
        }
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("no response for {id}");
}

async fn eventually(mut check: impl FnMut() -> bool, what: &str) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}

#[tokio::test]
async fn uppercase_request_round_trips_through_worker() {
    let broker = MemoryBroker::new();
    let worker = spawn_worker(&broker);
    let (_gateway, app) = start(&broker, settings()).await;

    let id = send(&app, r#"{"text":"hello","uppercase":true,"reverse":false}"#).await;
    assert_eq!(id, "frontend-rust-ab12/1");

    let body = await_response(&app, &id).await;
    assert_eq!(body["requestId"], id.as_str());
    assert_eq!(body["workerShortId"], "0001");
    assert_eq!(body["originLabel"], "aws");
    assert_eq!(body["text"], "HELLO");
    worker.abort();
}

#[tokio::test]
async fn both_flags_apply_and_missing_flags_default_off() {
    let broker = MemoryBroker::new();
    let worker = spawn_worker(&broker);
    let (_gateway, app) = start(&broker, settings()).await;

    let both = send(&app, r#"{"text":"abc","uppercase":true,"reverse":true}"#).await;
    let plain = send(&app, r#"{"text":"abc"}"#).await;

    assert_eq!(await_response(&app, &both).await["text"], "CBA");
    assert_eq!(await_response(&app, &plain).await["text"], "abc");
    worker.abort();
}

#[tokio::test]
async fn requests_wait_for_a_worker_to_attach() {
    let broker = MemoryBroker::new();
    let (_gateway, app) = start(&broker, settings()).await;

    let id = send(&app, r#"{"text":"late"}"#).await;
    eventually(|| broker.backlog_len(address::WORK_REQUESTS) == 1, "request to reach the broker").await;
    let uri = format!("/api/receive-response?request={id}");
    assert_eq!(call(&app, get(&uri)).await.status(), StatusCode::NOT_FOUND);

    let worker = spawn_worker(&broker);
    assert_eq!(await_response(&app, &id).await["text"], "late");
    worker.abort();
}

#[tokio::test]
async fn small_send_window_still_delivers_every_request_in_order() {
    let broker = MemoryBroker::with_send_window(1);
    let worker = spawn_worker(&broker);
    let (_gateway, app) = start(&broker, settings()).await;

    let mut ids = Vec::new();
    for n in 0..10 {
        ids.push(send(&app, &format!(r#"{{"text":"msg-{n}"}}"#)).await);
    }
    for (n, id) in ids.iter().enumerate() {
        assert_eq!(await_response(&app, id).await["text"], format!("msg-{n}"));
    }

    let data = body_json(call(&app, get("/api/data")).await).await;
    assert_eq!(data["requestIds"].as_array().map(Vec::len), Some(10));
    assert_eq!(data["requestIds"][0], "frontend-rust-ab12/1");
    assert_eq!(data["requestIds"][9], "frontend-rust-ab12/10");
    worker.abort();
}

#[tokio::test]
async fn malformed_inbound_messages_are_dropped() {
    let broker = MemoryBroker::new();
    let (gateway, app) = start(&broker, settings()).await;

    broker.deliver(address::WORKER_UPDATES, Envelope::new().with_property(property::WORKER_ID, "worker-x"));
    broker.deliver(address::WORKER_UPDATES, health_update("worker-cluster-b-0002", now_millis()));
    eventually(|| gateway.workers().len() == 1, "valid update to be recorded").await;

    let data = body_json(call(&app, get("/api/data")).await).await;
    assert!(data["workers"].get("worker-x").is_none());
    assert_eq!(data["workers"]["worker-cluster-b-0002"]["requestsProcessed"], 7);
    assert_eq!(data["workers"]["worker-cluster-b-0002"]["originLabel"], "gcp");
}

#[tokio::test]
async fn stale_workers_are_swept_and_fresh_ones_kept() {
    let broker = MemoryBroker::new();
    let settings = settings().with_liveness(Duration::from_millis(50), Duration::from_millis(10_000));
    let (gateway, app) = start(&broker, settings).await;

    broker.deliver(address::WORKER_UPDATES, health_update("worker-gone", now_millis() - 60_000));
    broker.deliver(address::WORKER_UPDATES, health_update("worker-fresh", now_millis()));
    // Updates arrive in order, so the stale one is recorded once the fresh one is.
    eventually(|| gateway.workers().get("worker-fresh").is_some(), "fresh worker").await;
    eventually(|| gateway.workers().get("worker-gone").is_none(), "stale worker to be pruned").await;

    let data = body_json(call(&app, get("/api/data")).await).await;
    let workers = data["workers"].as_object().map(|w| w.keys().cloned().collect::<Vec<_>>());
    assert_eq!(workers, Some(vec!["worker-fresh".to_owned()]));
}

#[tokio::test]
async fn receive_response_without_request_parameter_is_500() {
    let broker = MemoryBroker::new();
    let (_gateway, app) = start(&broker, settings()).await;
    assert_eq!(call(&app, get("/api/receive-response")).await.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
