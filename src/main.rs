mod controllers;
mod errors;
mod messages;
mod models;
mod provider;
mod saga;
mod scheduler;
mod state;
mod storage;

use crate::models::Role;
use crate::provider::CardProvider;
use crate::scheduler::{RetryRequest, RetryWorker};
use crate::state::Clinic;
use crate::storage::MemoryStore;
use anyhow::Context;
use axum::{
    routing::{get, post},
    Extension, Router,
};
use crossbeam_channel::bounded;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "medpost=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting medpost (patient/clinician messaging)");

    // Load configuration
    dotenv::dotenv().ok();

    let (retry_tx, retry_rx) = bounded::<RetryRequest>(1_024);
    let clinic = Clinic::new(Arc::new(MemoryStore::new()), Arc::new(CardProvider), retry_tx);

    // Retry worker (dedicated OS thread) — replays deferred prescription
    // requests after their scheduled delay.
    let worker = RetryWorker::new(retry_rx, clinic.clone());
    std::thread::Builder::new()
        .name("retry-worker".into())
        .spawn(move || worker.run())
        .context("Failed to spawn retry worker")?;

    // One doctor→patient conversation starter so the reply and prescription
    // flows can be exercised against a fresh process.
    let starter = clinic.deliver(
        Role::Doctor,
        Role::Patient,
        "Your results came back fine. Get in touch if anything changes.",
    )?;
    tracing::info!("seeded conversation starter {} for the patient", starter.id);

    // Build the application router
    let app = Router::new()
        .route("/health", get(controllers::health))
        .route("/", get(controllers::index))
        .route("/messages", post(controllers::create_message))
        .route("/messages/:id", get(controllers::show_message))
        .route(
            "/messages/:id/prescription",
            post(controllers::request_prescription),
        )
        .layer(Extension(clinic));

    let addr: SocketAddr = std::env::var("BIND_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:8000".into())
        .parse()
        .context("BIND_ADDR must be host:port")?;
    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
