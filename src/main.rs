//! Fenix Pipeline - sample subscriber
//!
//! Connects to the pipeline feed, subscribes to the configured channels for a
//! fixed duration, logs every message received, then unsubscribes and exits.

use std::net::SocketAddr;
use std::time::Duration;

use axum::{http::StatusCode, routing::get, Json, Router};
use tower_http::trace::TraceLayer;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use fenix_pipeline::{Config, Connection, FeedMessage, Subscriber, Subscription};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    info!("Starting Fenix Pipeline subscriber");

    let config = Config::load()?;
    info!(
        endpoint = %config.ws_endpoint,
        subscriptions = config.subscriptions.len(),
        duration_secs = config.duration_secs,
        "Configuration loaded"
    );

    if let Some(addr) = config.metrics_addr {
        tokio::spawn(async move {
            if let Err(e) = start_health_server(addr).await {
                warn!(error = %e, "Health server error");
            }
        });
    }

    let mut connection = Connection::new(config.api_key.clone()).with_endpoint(&config.ws_endpoint);
    connection.connect(log_message).await?;

    let subscriptions = config.subscriptions.clone();
    let duration = Duration::from_secs(config.duration_secs);
    connection
        .session(|subscriber| run_session(subscriber, subscriptions, duration))
        .await?;

    info!("Subscriber finished");
    Ok(())
}

/// Subscribe, stream for `duration` while the socket stays open, unsubscribe
async fn run_session(
    subscriber: Subscriber,
    subscriptions: Vec<Subscription>,
    duration: Duration,
) -> anyhow::Result<()> {
    info!("Subscribing");
    for subscription in &subscriptions {
        subscriber
            .subscribe(subscription.target, subscription.name.as_deref())
            .await?;
    }

    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    let deadline = tokio::time::Instant::now() + duration;
    while tokio::time::Instant::now() < deadline {
        ticker.tick().await;
        if !subscriber.is_connected() {
            info!("Socket closed, exiting session");
            return Ok(());
        }
    }

    info!("Unsubscribing");
    for subscription in &subscriptions {
        subscriber
            .unsubscribe(subscription.target, subscription.name.as_deref())
            .await?;
    }
    Ok(())
}

async fn log_message(message: FeedMessage) -> anyhow::Result<()> {
    match message {
        FeedMessage::Trade(trade) => {
            info!(
                trade = %trade,
                price = trade.price(),
                quantity = trade.quantity(),
                direction = trade.direction(),
                "Received trade"
            );
        }
        FeedMessage::Other(value) => {
            info!(message = %value, "Other message");
        }
    }
    Ok(())
}

/// Start HTTP server for health checks and metrics
async fn start_health_server(addr: SocketAddr) -> anyhow::Result<()> {
    let app = Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http());

    info!(addr = %addr, "Starting health check server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "component": "fenix-pipeline",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn metrics() -> Result<String, (StatusCode, String)> {
    use prometheus::{Encoder, TextEncoder};

    // Make sure the feed counters exist even before the first frame
    fenix_pipeline::metrics::metrics();

    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&prometheus::gather(), &mut buffer)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}
