// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Xero-Sync API Server
//!
//! Keeps the back office connected to Xero and pulls receivable invoices
//! into the local invoice store.

use chrono::Utc;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use xero_sync::{
    config::{Config, StorageBackend},
    db::{legacy, FirestoreDb, MemoryDb, Repositories},
    services::XeroClient,
    AppState,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Xero-Sync API");

    // Initialize storage
    let repos = match config.storage_backend {
        StorageBackend::Firestore => {
            let db = FirestoreDb::new(&config.gcp_project_id).await?;
            tracing::info!(project = %config.gcp_project_id, "Using Firestore storage");
            Repositories::from_backend(Arc::new(db))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; tokens and invoices are lost on restart");
            Repositories::from_backend(Arc::new(MemoryDb::new()))
        }
    };

    // One-time import of the file-based token store
    match legacy::import_legacy_files(
        repos.tokens.as_ref(),
        &config.legacy_token_file,
        &config.legacy_tenant_file,
        Utc::now(),
    )
    .await
    {
        Ok(import) if import.token_imported => {
            tracing::info!(
                tenant_imported = import.tenant_imported,
                "Imported legacy Xero token files"
            );
        }
        Ok(_) => {}
        Err(e) => tracing::error!(error = %e, "Legacy Xero token import failed"),
    }

    // Build shared state
    let xero = Arc::new(XeroClient::new(&config));
    let state = Arc::new(AppState::new(config.clone(), repos, xero));

    // Build router
    let app = xero_sync::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("xero_sync=debug,info"));

    tracing_subscriber::registry().with(filter).with(format).init();
}
