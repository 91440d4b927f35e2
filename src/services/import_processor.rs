//! Import JetStream processor
//!
//! Queues spreadsheet imports on JetStream for:
//! - Backpressure when several users upload at once
//! - Real-time progress updates after every batch
//! - Persistence across restarts
//!
//! ## Streams
//! - `LEADBOOK_IMPORT_JOBS` - lead spreadsheet imports, processed one at a time

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use async_nats::jetstream::{self, Context as JsContext};
use async_nats::Client;
use async_trait::async_trait;
use futures::StreamExt;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::services::import::{ImportObserver, LeadImporter};
use crate::types::{
    ImportJobStatus, ImportJobStatusUpdate, ImportJobSubmitResponse, ImportLeadsRequest,
    ImportResult, QueuedImportJob,
};

// Stream and consumer names
const STREAM_NAME: &str = "LEADBOOK_IMPORT_JOBS";
const CONSUMER_NAME: &str = "lead_import_workers";
const SUBJECT: &str = "leadbook.jobs.import.leads";
pub const STATUS_PREFIX: &str = "leadbook.job.import.status";

/// Import job processor with JetStream integration
pub struct ImportProcessor {
    client: Client,
    js: JsContext,
    importer: LeadImporter,
    pending_count: AtomicU32,
}

impl ImportProcessor {
    /// Create a new import processor, initializing the JetStream stream
    pub async fn new(client: Client, importer: LeadImporter) -> Result<Self> {
        let js = jetstream::new(client.clone());

        let stream_config = jetstream::stream::Config {
            name: STREAM_NAME.to_string(),
            subjects: vec![SUBJECT.to_string()],
            max_messages: 1_000,
            max_bytes: 500 * 1024 * 1024, // uploads are carried base64-encoded
            retention: jetstream::stream::RetentionPolicy::WorkQueue,
            ..Default::default()
        };
        js.get_or_create_stream(stream_config).await?;
        info!("JetStream import stream '{}' ready", STREAM_NAME);

        Ok(Self {
            client,
            js,
            importer,
            pending_count: AtomicU32::new(0),
        })
    }

    /// Submit an import job to the queue
    pub async fn submit_job(&self, actor_id: Uuid, request: ImportLeadsRequest) -> Result<ImportJobSubmitResponse> {
        let job = QueuedImportJob::new(actor_id, request);
        let job_id = job.id;

        let payload = serde_json::to_vec(&job)?;
        self.js.publish(SUBJECT, payload.into()).await?.await?;

        let pending = enqueued(&self.pending_count);
        info!(
            "Import job {} submitted ('{}', {} bytes), position {} in queue",
            job_id, job.request.filename, job.request.size_bytes, pending
        );

        self.publish_status(job_id, ImportJobStatus::Queued { position: pending }).await?;

        Ok(ImportJobSubmitResponse {
            job_id,
            message: "Import job queued".to_string(),
        })
    }

    /// Publish an import job status update
    pub async fn publish_status(&self, job_id: Uuid, status: ImportJobStatus) -> Result<()> {
        let update = ImportJobStatusUpdate::new(job_id, status);
        let subject = format!("{}.{}", STATUS_PREFIX, job_id);
        let payload = serde_json::to_vec(&update)?;

        self.client.publish(subject, payload.into()).await?;
        Ok(())
    }

    /// Start processing import jobs from the queue
    pub async fn start_processing(self: Arc<Self>) -> Result<()> {
        let stream = self.js.get_stream(STREAM_NAME).await?;

        let consumer_config = jetstream::consumer::pull::Config {
            durable_name: Some(CONSUMER_NAME.to_string()),
            ack_policy: jetstream::consumer::AckPolicy::Explicit,
            max_deliver: 3,
            ..Default::default()
        };

        let consumer = stream.get_or_create_consumer(CONSUMER_NAME, consumer_config).await?;
        info!("JetStream import consumer '{}' ready", CONSUMER_NAME);

        let mut messages = consumer.messages().await?;

        while let Some(msg) = messages.next().await {
            match msg {
                Ok(msg) => {
                    // Sequential: all writes of one import finish before the next starts
                    if let Err(e) = self.process_job(msg).await {
                        error!("Failed to process import job: {}", e);
                    }
                }
                Err(e) => {
                    error!("Error receiving import message: {}", e);
                }
            }
        }

        Ok(())
    }

    /// Process a single import job
    async fn process_job(&self, msg: jetstream::Message) -> Result<()> {
        let start_time = Instant::now();
        dequeued(&self.pending_count);
        let job: QueuedImportJob = serde_json::from_slice(&msg.payload)?;
        let job_id = job.id;

        info!("Processing import job {} from file '{}'", job_id, job.request.filename);

        // ACK immediately to prevent redelivery during long processing
        if let Err(e) = msg.ack().await {
            error!("Failed to ack import job {}: {:?}", job_id, e);
        }

        self.publish_status(job_id, ImportJobStatus::Parsing).await?;

        let progress = JobProgress { processor: self, job_id };
        let result = self.importer.import(job.actor_id, &job.request, &progress).await;

        let duration_ms = start_time.elapsed().as_millis();
        if result.success {
            info!("Import job {} completed in {}ms: {}", job_id, duration_ms, result.summary());
            self.publish_status(job_id, ImportJobStatus::Completed { result }).await?;
        } else if result.total_processed > 0 {
            // rows were read but none imported; the result carries the row errors
            warn!("Import job {} imported nothing in {}ms: {}", job_id, duration_ms, result.summary());
            self.publish_status(job_id, ImportJobStatus::Completed { result }).await?;
        } else {
            warn!("Import job {} failed: {}", job_id, result.message);
            self.publish_status(job_id, ImportJobStatus::Failed { error: result.message }).await?;
        }

        Ok(())
    }
}

/// Count a submitted job, returning its queue position
fn enqueued(pending: &AtomicU32) -> u32 {
    let previous = pending
        .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| Some(n.saturating_add(1)))
        .unwrap_or_else(|n| n);
    previous.saturating_add(1)
}

/// Jobs left over from a previous run or redelivered ones were never
/// counted here, so the count stops at zero
fn dequeued(pending: &AtomicU32) {
    let _ = pending.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
}

/// Publishes the running totals of one job after every batch
struct JobProgress<'a> {
    processor: &'a ImportProcessor,
    job_id: Uuid,
}

#[async_trait]
impl<'a> ImportObserver for JobProgress<'a> {
    async fn batch_finished(&self, progress: &ImportResult) {
        let status = ImportJobStatus::Importing {
            processed: progress.total_processed,
            imported: progress.imported,
            skipped: progress.skipped,
        };
        if let Err(e) = self.processor.publish_status(self.job_id, status).await {
            warn!("Failed to publish progress of import job {}: {}", self.job_id, e);
        }
    }
}
