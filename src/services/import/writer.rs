//! Final record assembly and insert

use thiserror::Error;
use tracing::error;
use uuid::Uuid;

use super::references::ResolvedReferences;
use super::validator::ValidRow;
use crate::services::lead_store::LeadTransaction;
use crate::types::{Lead, NewLead, UNKNOWN_LOCATION};

/// Store failure scoped to a single row. The detail goes to the log,
/// the row issue only carries the display text.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to look up existing data")]
    Lookup { detail: String },

    #[error("failed to save lead")]
    Write { detail: String },
}

impl PersistenceError {
    pub fn lookup(e: anyhow::Error) -> Self {
        PersistenceError::Lookup { detail: format!("{:#}", e) }
    }

    pub fn write(e: anyhow::Error) -> Self {
        PersistenceError::Write { detail: format!("{:#}", e) }
    }

    pub fn detail(&self) -> &str {
        match self {
            PersistenceError::Lookup { detail } | PersistenceError::Write { detail } => detail,
        }
    }
}

/// Writes leads on behalf of one actor
#[derive(Debug, Clone, Copy)]
pub struct RecordWriter {
    actor_id: Uuid,
}

impl RecordWriter {
    pub fn new(actor_id: Uuid) -> Self {
        Self { actor_id }
    }

    pub fn build(&self, row: &ValidRow, references: &ResolvedReferences) -> NewLead {
        NewLead {
            name: row.name.clone(),
            phone: row.phone.clone(),
            lead_date: row.lead_date,
            brand_id: references.brand_id,
            label_id: references.label_id,
            chat_status: references.chat_status,
            city: or_unknown(&row.city),
            province: or_unknown(&row.province),
            webinar: references.webinar,
            comment: (!row.comment.is_empty()).then(|| row.comment.clone()),
            created_by: self.actor_id,
        }
    }

    pub async fn write(
        &self,
        tx: &mut dyn LeadTransaction,
        row: &ValidRow,
        references: &ResolvedReferences,
    ) -> Result<Lead, PersistenceError> {
        let lead = self.build(row, references);
        tx.insert_lead(&lead).await.map_err(|e| {
            let err = PersistenceError::write(e);
            error!(
                "Failed to insert lead from row {} (phone {}): {}",
                row.line,
                lead.phone,
                err.detail()
            );
            err
        })
    }
}

fn or_unknown(value: &str) -> String {
    if value.is_empty() {
        UNKNOWN_LOCATION.to_string()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::lead_store::{LeadStore, MemoryLeadStore};
    use crate::types::{ChatStatus, WebinarStatus};
    use chrono::NaiveDate;

    fn row(phone: &str, city: &str, comment: &str) -> ValidRow {
        ValidRow {
            line: 9,
            name: "John Doe".to_string(),
            phone: phone.to_string(),
            lead_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            brand: String::new(),
            label: String::new(),
            chat_status: String::new(),
            city: city.to_string(),
            province: String::new(),
            webinar: String::new(),
            comment: comment.to_string(),
        }
    }

    #[test]
    fn test_build_applies_defaults_and_actor() {
        let actor = Uuid::new_v4();
        let lead = RecordWriter::new(actor).build(&row("081234567890", "", ""), &ResolvedReferences::default());

        assert_eq!(lead.city, "Unknown");
        assert_eq!(lead.province, "Unknown");
        assert_eq!(lead.comment, None);
        assert_eq!(lead.created_by, actor);
        assert_eq!(lead.chat_status, ChatStatus::New);
        assert_eq!(lead.webinar, WebinarStatus::None);
    }

    #[test]
    fn test_build_keeps_given_values() {
        let lead = RecordWriter::new(Uuid::new_v4())
            .build(&row("081234567890", "Bandung", "call after 5"), &ResolvedReferences::default());
        assert_eq!(lead.city, "Bandung");
        assert_eq!(lead.comment.as_deref(), Some("call after 5"));
    }

    #[tokio::test]
    async fn test_rejected_insert_is_persistence_error() {
        let store = MemoryLeadStore::new();
        let mut tx = store.begin().await.unwrap();
        let writer = RecordWriter::new(Uuid::new_v4());
        let refs = ResolvedReferences::default();

        writer.write(tx.as_mut(), &row("081234567890", "", ""), &refs).await.unwrap();
        let err = writer
            .write(tx.as_mut(), &row("081234567890", "", ""), &refs)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "failed to save lead");
        assert!(err.detail().contains("leads_phone_key"));
    }
}
