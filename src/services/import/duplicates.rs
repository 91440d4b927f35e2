//! Duplicate detection against the lead store

use thiserror::Error;
use uuid::Uuid;

use super::writer::PersistenceError;
use crate::services::lead_store::LeadTransaction;

#[derive(Debug, Error)]
pub enum DuplicateError {
    #[error("phone already exists")]
    PhoneExists { existing_id: Uuid },

    #[error(transparent)]
    Lookup(#[from] PersistenceError),
}

/// Rejects rows whose normalized phone is already stored. Runs inside the
/// import transaction, so rows written earlier in the same file count too.
#[derive(Debug, Clone, Copy, Default)]
pub struct DuplicateChecker;

impl DuplicateChecker {
    pub async fn check(&self, tx: &mut dyn LeadTransaction, phone: &str) -> Result<(), DuplicateError> {
        match tx.find_lead_by_phone(phone).await {
            Ok(Some(existing_id)) => Err(DuplicateError::PhoneExists { existing_id }),
            Ok(None) => Ok(()),
            Err(e) => Err(PersistenceError::lookup(e).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::lead_store::{LeadStore, MemoryLeadStore};
    use crate::types::{ChatStatus, NewLead, WebinarStatus};
    use chrono::NaiveDate;

    #[tokio::test]
    async fn test_existing_phone_is_duplicate() {
        let store = MemoryLeadStore::new();
        let mut tx = store.begin().await.unwrap();
        let stored = tx
            .insert_lead(&NewLead {
                name: "Siti".to_string(),
                phone: "081234567890".to_string(),
                lead_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
                brand_id: None,
                label_id: None,
                chat_status: ChatStatus::New,
                city: "Jakarta".to_string(),
                province: "DKI Jakarta".to_string(),
                webinar: WebinarStatus::None,
                comment: None,
                created_by: Uuid::new_v4(),
            })
            .await
            .unwrap();

        let err = DuplicateChecker.check(tx.as_mut(), "081234567890").await.unwrap_err();
        assert!(matches!(err, DuplicateError::PhoneExists { existing_id } if existing_id == stored.id));
        assert_eq!(err.to_string(), "phone already exists");

        assert!(DuplicateChecker.check(tx.as_mut(), "089999999999").await.is_ok());
    }
}
