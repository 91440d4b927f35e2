//! Batched import driver
//!
//! One transaction spans the whole file. Rows are processed in file order in
//! chunks of `batch_size`; a chunk is only a progress/logging unit, failed
//! rows never stop the rest. The transaction commits if at least one lead was
//! written and rolls back otherwise.

use async_trait::async_trait;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::duplicates::{DuplicateChecker, DuplicateError};
use super::references::ReferenceResolver;
use super::row_extractor::RawRow;
use super::validator::RowValidator;
use super::writer::RecordWriter;
use crate::services::lead_store::{LeadStore, LeadTransaction};
use crate::types::{ImportIssue, ImportResult};

/// Receives the running totals after every finished batch
#[async_trait]
pub trait ImportObserver: Send + Sync {
    async fn batch_finished(&self, progress: &ImportResult);
}

/// Observer for callers that do not report progress
pub struct NoProgress;

#[async_trait]
impl ImportObserver for NoProgress {
    async fn batch_finished(&self, _progress: &ImportResult) {}
}

pub struct BatchCoordinator<'a> {
    store: &'a dyn LeadStore,
    batch_size: usize,
    validator: RowValidator,
    duplicates: DuplicateChecker,
    references: ReferenceResolver,
    writer: RecordWriter,
}

impl<'a> BatchCoordinator<'a> {
    pub fn new(store: &'a dyn LeadStore, actor_id: Uuid, batch_size: usize) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
            validator: RowValidator::today(),
            duplicates: DuplicateChecker,
            references: ReferenceResolver,
            writer: RecordWriter::new(actor_id),
        }
    }

    pub fn with_validator(mut self, validator: RowValidator) -> Self {
        self.validator = validator;
        self
    }

    pub async fn run<I>(&self, rows: I, observer: &dyn ImportObserver) -> ImportResult
    where
        I: IntoIterator<Item = RawRow>,
        I::IntoIter: Send,
    {
        let mut tx = match self.store.begin().await {
            Ok(tx) => tx,
            Err(e) => {
                error!("Failed to start import transaction: {:#}", e);
                return ImportResult::failed("Import failed: could not start a database transaction");
            }
        };

        let mut rows = rows.into_iter();
        let mut result = ImportResult::default();
        let mut batch_number = 0u32;

        loop {
            let batch: Vec<RawRow> = rows.by_ref().take(self.batch_size).collect();
            if batch.is_empty() {
                break;
            }
            batch_number += 1;

            let mut batch_result = ImportResult::default();
            for row in batch {
                self.process_row(tx.as_mut(), row, &mut batch_result).await;
            }
            debug!(
                "Import batch {} done: {} processed, {} imported, {} skipped",
                batch_number, batch_result.total_processed, batch_result.imported, batch_result.skipped
            );

            result.merge(batch_result);
            observer.batch_finished(&result).await;
        }

        self.finish(tx, result).await
    }

    async fn finish(&self, tx: Box<dyn LeadTransaction>, mut result: ImportResult) -> ImportResult {
        if result.imported > 0 {
            if let Err(e) = tx.commit().await {
                error!("Failed to commit import of {} leads: {:#}", result.imported, e);
                return ImportResult::failed("Import failed: changes could not be saved, nothing was imported");
            }
            result.success = true;
            result.message = format!("Import completed. {}", result.summary());
            info!("Import committed: {}", result.summary());
        } else {
            if let Err(e) = tx.rollback().await {
                error!("Failed to roll back import: {:#}", e);
            }
            result.success = false;
            result.message = if result.total_processed == 0 {
                "No data rows found in the file".to_string()
            } else {
                format!("No leads were imported. {}", result.summary())
            };
            warn!("Import rolled back: {}", result.summary());
        }
        result
    }

    async fn process_row(&self, tx: &mut dyn LeadTransaction, raw: RawRow, result: &mut ImportResult) {
        result.total_processed += 1;

        let row = match self.validator.validate(&raw) {
            Ok(row) => row,
            Err(errors) => {
                result.errors.extend(errors.iter().map(|e| {
                    ImportIssue::error(raw.line, e.field(), e.to_string(), Some(raw.cell(e.column())))
                }));
                result.skipped += 1;
                return;
            }
        };

        if let Err(e) = self.duplicates.check(tx, &row.phone).await {
            match &e {
                DuplicateError::PhoneExists { existing_id } => {
                    debug!("Row {} duplicates lead {}", row.line, existing_id)
                }
                DuplicateError::Lookup(inner) => {
                    error!("Duplicate lookup failed for row {}: {}", row.line, inner.detail())
                }
            }
            result
                .errors
                .push(ImportIssue::error(row.line, "phone", e.to_string(), Some(&row.phone)));
            result.skipped += 1;
            return;
        }

        let references = match self.references.resolve(tx, &row).await {
            Ok(references) => references,
            Err(e) => {
                error!("Reference lookup failed for row {}: {}", row.line, e.detail());
                result
                    .errors
                    .push(ImportIssue::error(row.line, "reference", e.to_string(), None));
                result.skipped += 1;
                return;
            }
        };

        result.warnings.extend(
            references
                .warnings
                .iter()
                .map(|w| ImportIssue::warning(row.line, w.field(), w.to_string(), Some(w.value()))),
        );

        match self.writer.write(tx, &row, &references).await {
            Ok(_) => result.imported += 1,
            Err(e) => {
                result
                    .errors
                    .push(ImportIssue::error(row.line, "lead", e.to_string(), Some(&row.phone)));
                result.skipped += 1;
            }
        }
    }
}
