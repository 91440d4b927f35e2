//! Spreadsheet lead import
//!
//! Stages, composed per call:
//! file_loader -> row_extractor -> validator -> duplicates -> references -> writer,
//! driven batch by batch by the coordinator inside one store transaction.

pub mod coordinator;
pub mod duplicates;
pub mod file_loader;
pub mod references;
pub mod row_extractor;
pub mod validator;
pub mod writer;

#[cfg(test)]
pub(crate) mod test_support;

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::ImportSettings;
use crate::services::lead_store::LeadStore;
use crate::types::{ImportLeadsRequest, ImportResult};

pub use coordinator::{BatchCoordinator, ImportObserver, NoProgress};
pub use file_loader::{FileLoader, UploadedFile};
pub use row_extractor::RowExtractor;

/// Entry point of the import pipeline. Never fails: every problem ends up in
/// the returned `ImportResult`.
#[derive(Clone)]
pub struct LeadImporter {
    store: Arc<dyn LeadStore>,
    settings: ImportSettings,
}

impl LeadImporter {
    pub fn new(store: Arc<dyn LeadStore>, settings: ImportSettings) -> Self {
        Self { store, settings }
    }

    /// Import a base64 upload as received over NATS
    pub async fn import(
        &self,
        actor_id: Uuid,
        request: &ImportLeadsRequest,
        observer: &dyn ImportObserver,
    ) -> ImportResult {
        let bytes = match BASE64.decode(request.file_base64.trim()) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Import of '{}' rejected, invalid base64: {}", request.filename, e);
                return ImportResult::failed(format!(
                    "File could not be read as a spreadsheet: {}",
                    e
                ));
            }
        };

        let file = UploadedFile {
            bytes: &bytes,
            declared_size: request.size_bytes,
            mime_type: &request.mime_type,
        };
        info!(
            "Importing '{}' ({} bytes) for user {}",
            request.filename,
            bytes.len(),
            actor_id
        );
        self.import_file(actor_id, &file, observer).await
    }

    pub async fn import_file(
        &self,
        actor_id: Uuid,
        file: &UploadedFile<'_>,
        observer: &dyn ImportObserver,
    ) -> ImportResult {
        let range = match FileLoader::new(self.settings.max_file_bytes).load(file) {
            Ok(range) => range,
            Err(e) => {
                warn!("Import rejected for user {}: {}", actor_id, e);
                return ImportResult::failed(e.to_string());
            }
        };

        BatchCoordinator::new(self.store.as_ref(), actor_id, self.settings.batch_size)
            .run(RowExtractor::new(range), observer)
            .await
    }
}
