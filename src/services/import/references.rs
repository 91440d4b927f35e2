//! Brand/label resolution and status text normalization

use thiserror::Error;
use uuid::Uuid;

use super::validator::ValidRow;
use super::writer::PersistenceError;
use crate::services::lead_store::LeadTransaction;
use crate::types::{ChatStatus, WebinarStatus};

/// Informational, the row is still imported
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferenceWarning {
    #[error("brand '{0}' auto-created")]
    BrandAutoCreated(String),

    #[error("label '{0}' not found, lead imported without label")]
    LabelNotFound(String),
}

impl ReferenceWarning {
    pub fn field(&self) -> &'static str {
        match self {
            ReferenceWarning::BrandAutoCreated(_) => "brand",
            ReferenceWarning::LabelNotFound(_) => "label",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            ReferenceWarning::BrandAutoCreated(name) | ReferenceWarning::LabelNotFound(name) => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResolvedReferences {
    pub brand_id: Option<Uuid>,
    pub label_id: Option<Uuid>,
    pub chat_status: ChatStatus,
    pub webinar: WebinarStatus,
    pub warnings: Vec<ReferenceWarning>,
}

/// Brands are created on demand, labels are looked up only
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceResolver;

impl ReferenceResolver {
    pub async fn resolve(
        &self,
        tx: &mut dyn LeadTransaction,
        row: &ValidRow,
    ) -> Result<ResolvedReferences, PersistenceError> {
        let mut resolved = ResolvedReferences {
            chat_status: ChatStatus::from_text(&row.chat_status),
            webinar: WebinarStatus::from_text(&row.webinar),
            ..Default::default()
        };

        if !row.brand.is_empty() {
            let lookup = tx
                .find_or_create_brand(&row.brand)
                .await
                .map_err(PersistenceError::lookup)?;
            if lookup.created {
                resolved.warnings.push(ReferenceWarning::BrandAutoCreated(row.brand.clone()));
            }
            resolved.brand_id = Some(lookup.brand.id);
        }

        if !row.label.is_empty() {
            match tx
                .find_label_by_name(&row.label)
                .await
                .map_err(PersistenceError::lookup)?
            {
                Some(label) => resolved.label_id = Some(label.id),
                None => resolved.warnings.push(ReferenceWarning::LabelNotFound(row.label.clone())),
            }
        }

        Ok(resolved)
    }
}
