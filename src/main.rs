//! Leadbook Worker - bulk lead import/export backend
//!
//! This worker connects to NATS and handles spreadsheet import, template and
//! export requests from the frontend.

mod auth;
mod cli;
mod config;
mod defaults;
mod db;
mod handlers;
mod services;
mod types;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, error};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tracing_appender::rolling::{RollingFileAppender, Rotation};

use crate::cli::{Cli, Command};
use crate::config::{Config, StoreBackend};
use crate::db::store::PgLeadStore;
use crate::services::lead_store::{LeadStore, MemoryLeadStore};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs directory - use LOGS_DIR env var or default to ../logs (relative to worker)
    let logs_dir = std::env::var("LOGS_DIR")
        .unwrap_or_else(|_| "../logs".to_string());
    std::fs::create_dir_all(&logs_dir).ok();

    // File appender for persistent logs (daily rotation)
    let file_appender = RollingFileAppender::new(
        Rotation::DAILY,
        &logs_dir,
        "leadbook-worker.log",
    );
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // Initialize logging - both stdout and file
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,leadbook_worker=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())  // stdout
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false))  // file
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Configuration loaded (lead store: {:?})", config.store_backend);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Migrate => {
            let pool = connect_database(&config).await?;
            db::run_migrations(&pool).await?;
            Ok(())
        }
        Command::Serve => serve(config).await,
    }
}

async fn connect_database(config: &Config) -> Result<sqlx::PgPool> {
    let database_url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL must be set")?;
    let pool = db::create_pool(database_url).await?;
    info!("Connected to PostgreSQL");
    Ok(pool)
}

async fn serve(config: Config) -> Result<()> {
    info!("Starting Leadbook Worker...");

    let store: Arc<dyn LeadStore> = match config.store_backend {
        StoreBackend::Postgres => {
            let pool = connect_database(&config).await?;
            db::run_migrations(&pool).await?;
            Arc::new(PgLeadStore::new(pool))
        }
        StoreBackend::Memory => {
            info!("Using in-memory lead store, data is lost on restart");
            Arc::new(MemoryLeadStore::new())
        }
    };

    // Connect to NATS (supports optional NATS_USER/NATS_PASSWORD auth).
    let nats_client = match (std::env::var("NATS_USER"), std::env::var("NATS_PASSWORD")) {
        (Ok(user), Ok(password)) if !user.is_empty() => {
            async_nats::ConnectOptions::new()
                .user_and_password(user, password)
                .connect(&config.nats_url)
                .await?
        }
        _ => async_nats::connect(&config.nats_url).await?,
    };
    info!("Connected to NATS at {}", config.nats_url);

    // Start message handlers
    let handler_result = handlers::start_handlers(nats_client, store, &config).await;

    if let Err(e) = handler_result {
        error!("Handler error: {}", e);
        return Err(e);
    }

    Ok(())
}
