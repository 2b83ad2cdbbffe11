//! Entry point for the `relay-gateway` HTTP server.

use std::sync::Arc;

use relay_broker::{AmqpTransport, Transport};
use relay_core::InstanceId;
use relay_gateway::{routes::create_router, Gateway, GatewayConfig, GatewaySettings};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match GatewayConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };

    let instance_id = InstanceId::generate();
    let broker = config.broker.clone().with_container_id(instance_id.as_str());
    let transport: Arc<dyn Transport> = match AmqpTransport::connect(&broker).await {
        Ok(t) => Arc::new(t),
        Err(e) => {
            tracing::error!(host = %broker.host, port = broker.port, error = %e, "failed to connect to broker");
            std::process::exit(1);
        }
    };

    let settings = GatewaySettings::new(instance_id.clone())
        .with_liveness(config.sweep_interval, config.stale_threshold);
    let gateway = match Gateway::start(transport, settings).await {
        Ok(g) => g,
        Err(e) => {
            tracing::error!(error = %e, "failed to attach broker links");
            std::process::exit(1);
        }
    };

    let addr = config.http_addr();
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(addr = %addr, error = %e, "failed to bind");
            std::process::exit(1);
        }
    };

    info!(addr = %addr, instance_id = %instance_id, "relay-gateway listening");

    if let Err(e) = axum::serve(listener, create_router(gateway)).await {
        tracing::error!(error = %e, "server error");
        std::process::exit(1);
    }
}
