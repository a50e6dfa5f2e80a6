//! Closing Package Server
//!
//! Parses lender requirement checklists, analyzes uploaded closing packages
//! and reorganizes them into the lender's order. Provides REST API
//! endpoints for:
//!
//! - Requirement parsing (stored per session)
//! - Document analysis (sections, categories, fields, quality)
//! - Package reorganization with a generated cover page
//! - One-time package download
//!
//! ## Architecture
//!
//! Text extraction and PDF work run on the blocking pool under timeouts.
//! An optional ordering advisor, reached over HTTP, proposes the section
//! order; when it is absent or fails the catalog order is used.

use std::sync::Arc;

use clap::Parser;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod advisor;
mod api;
mod cache;
mod config;
mod error;
mod extract;
mod pipeline;
mod state;
mod storage;

use config::Config;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::parse();

    // Initialize logging
    let log_level = if config.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting package server on {}:{}", config.host, config.port);

    let state = Arc::new(AppState::from_config(&config)?);

    // Configure CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = api::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr = config.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Server listening on http://{}", addr);
    info!("Upload limit: {} MB", config.max_upload_mb);
    info!("PDF timeout: {}ms", config.pdf_timeout_ms);

    axum::serve(listener, app).await?;

    Ok(())
}
