//! NATS message handlers

pub mod export;
pub mod import;
pub mod ping;

use std::sync::Arc;

use anyhow::Result;
use async_nats::Client;
use tokio::select;
use tracing::{error, info};

use crate::config::Config;
use crate::services::export::ExportBuilder;
use crate::services::import::LeadImporter;
use crate::services::import_processor::ImportProcessor;
use crate::services::lead_store::LeadStore;

/// Start all message handlers
pub async fn start_handlers(client: Client, store: Arc<dyn LeadStore>, config: &Config) -> Result<()> {
    info!("Starting message handlers (lead store: {})...", store.name());

    let jwt_secret = Arc::new(config.jwt_secret.clone());
    let importer = LeadImporter::new(Arc::clone(&store), config.import);
    let export_builder = Arc::new(ExportBuilder::new(Arc::clone(&store)));

    // Subscribe to all subjects
    let ping_sub = client.subscribe("leadbook.ping").await?;
    let import_sub = client.subscribe("leadbook.lead.import").await?;
    let template_sub = client.subscribe("leadbook.lead.template").await?;
    let export_sub = client.subscribe("leadbook.lead.export").await?;

    info!("Subscribed to NATS subjects");

    // Spawn handlers
    let client_ping = client.clone();
    let store_name = store.name();
    let ping_handle = tokio::spawn(async move {
        ping::handle_ping(client_ping, ping_sub, store_name).await
    });

    let client_import = client.clone();
    let secret_import = Arc::clone(&jwt_secret);
    let importer_sync = importer.clone();
    let import_handle = tokio::spawn(async move {
        import::handle_import(client_import, import_sub, secret_import, importer_sync).await
    });

    let client_template = client.clone();
    let secret_template = Arc::clone(&jwt_secret);
    let template_handle = tokio::spawn(async move {
        export::handle_template(client_template, template_sub, secret_template).await
    });

    let client_export = client.clone();
    let secret_export = Arc::clone(&jwt_secret);
    let export_handle = tokio::spawn(async move {
        export::handle_export(client_export, export_sub, secret_export, export_builder).await
    });

    // Start lead import processor
    let client_jobs = client.clone();
    let secret_jobs = Arc::clone(&jwt_secret);
    tokio::spawn(async move {
        match ImportProcessor::new(client_jobs.clone(), importer).await {
            Ok(processor) => {
                let processor = Arc::new(processor);

                let submit_sub = match client_jobs.subscribe("leadbook.lead.import.submit").await {
                    Ok(sub) => sub,
                    Err(e) => {
                        error!("Failed to subscribe to lead.import.submit: {}", e);
                        return;
                    }
                };

                // Start submit handler
                let client_submit = client_jobs.clone();
                let processor_submit = Arc::clone(&processor);
                tokio::spawn(async move {
                    if let Err(e) = import::handle_import_submit(client_submit, submit_sub, secret_jobs, processor_submit).await {
                        error!("Lead import submit handler error: {}", e);
                    }
                });

                // Start job processor
                let processor_main = Arc::clone(&processor);
                tokio::spawn(async move {
                    if let Err(e) = processor_main.start_processing().await {
                        error!("Lead import processor error: {}", e);
                    }
                });

                info!("Lead import processor started");
            }
            Err(e) => {
                error!("Failed to create lead import processor: {}", e);
            }
        }
    });

    info!("All handlers started");

    // Wait for any handler to finish (which shouldn't happen normally)
    select! {
        result = ping_handle => {
            error!("Ping handler finished: {:?}", result);
        }
        result = import_handle => {
            error!("Import handler finished: {:?}", result);
        }
        result = template_handle => {
            error!("Template handler finished: {:?}", result);
        }
        result = export_handle => {
            error!("Export handler finished: {:?}", result);
        }
    }

    Ok(())
}
