//! Import types for spreadsheet lead import

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Import issue level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportIssueLevel {
    Warning,
    Error,
}

/// Single row-tagged import issue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportIssue {
    /// Line number in the uploaded sheet (1-based, header included)
    pub row_number: u32,
    pub level: ImportIssueLevel,
    pub field: String,
    pub message: String,
    pub original_value: Option<String>,
}

impl ImportIssue {
    pub fn error(row_number: u32, field: &str, message: impl Into<String>, original_value: Option<&str>) -> Self {
        Self {
            row_number,
            level: ImportIssueLevel::Error,
            field: field.to_string(),
            message: message.into(),
            original_value: original_value.filter(|v| !v.is_empty()).map(str::to_string),
        }
    }

    pub fn warning(row_number: u32, field: &str, message: impl Into<String>, original_value: Option<&str>) -> Self {
        Self {
            row_number,
            level: ImportIssueLevel::Warning,
            field: field.to_string(),
            message: message.into(),
            original_value: original_value.filter(|v| !v.is_empty()).map(str::to_string),
        }
    }
}

impl fmt::Display for ImportIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Row {}: {}", self.row_number, self.message)
    }
}

/// Aggregate outcome of one import call. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub success: bool,
    pub message: String,
    pub total_processed: u32,
    pub imported: u32,
    pub skipped: u32,
    pub errors: Vec<ImportIssue>,
    pub warnings: Vec<ImportIssue>,
}

impl ImportResult {
    /// Result for a failure that happened before any row was processed
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            ..Default::default()
        }
    }

    /// Append another partial result, keeping issue order
    pub fn merge(&mut self, other: ImportResult) {
        self.total_processed += other.total_processed;
        self.imported += other.imported;
        self.skipped += other.skipped;
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    pub fn summary(&self) -> String {
        format!(
            "{} rows processed: {} imported, {} skipped, {} warnings",
            self.total_processed,
            self.imported,
            self.skipped,
            self.warnings.len()
        )
    }
}

/// Uploaded spreadsheet as carried over NATS
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportLeadsRequest {
    pub filename: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub file_base64: String,
}

// =============================================================================
// ASYNC IMPORT JOBS
// =============================================================================

/// Import job queued on JetStream
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedImportJob {
    pub id: Uuid,
    pub actor_id: Uuid,
    pub submitted_at: DateTime<Utc>,
    pub request: ImportLeadsRequest,
}

impl QueuedImportJob {
    pub fn new(actor_id: Uuid, request: ImportLeadsRequest) -> Self {
        Self {
            id: Uuid::new_v4(),
            actor_id,
            submitted_at: Utc::now(),
            request,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportJobSubmitResponse {
    pub job_id: Uuid,
    pub message: String,
}

/// Import job lifecycle
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ImportJobStatus {
    Queued { position: u32 },
    Parsing,
    #[serde(rename_all = "camelCase")]
    Importing { processed: u32, imported: u32, skipped: u32 },
    Completed { result: ImportResult },
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportJobStatusUpdate {
    pub job_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub status: ImportJobStatus,
}

impl ImportJobStatusUpdate {
    pub fn new(job_id: Uuid, status: ImportJobStatus) -> Self {
        Self {
            job_id,
            timestamp: Utc::now(),
            status,
        }
    }
}
