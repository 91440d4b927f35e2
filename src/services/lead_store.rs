//! Lead store abstraction
//!
//! The import pipeline only talks to the store through these traits:
//! - `PgLeadStore` (db::store) is the production implementation
//! - `MemoryLeadStore` keeps everything in process memory (tests, development)
//!
//! Selected via the LEAD_STORE env variable (see `Config`).

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::types::{Brand, ExportFilter, Label, Lead, LeadExportRow, NewLead};

/// Outcome of a brand lookup that may have created the brand
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrandLookup {
    pub brand: Brand,
    pub created: bool,
}

/// Operations available inside the single import transaction.
///
/// Reads observe earlier writes of the same transaction, so a row can see the
/// phones and brands written by the rows before it.
#[async_trait]
pub trait LeadTransaction: Send {
    /// Id of the lead owning this normalized phone, if any
    async fn find_lead_by_phone(&mut self, phone: &str) -> Result<Option<Uuid>>;

    /// Exact-name lookup, creating the brand when it does not exist yet
    async fn find_or_create_brand(&mut self, name: &str) -> Result<BrandLookup>;

    /// Case-insensitive exact-name lookup. Never creates.
    async fn find_label_by_name(&mut self, name: &str) -> Result<Option<Label>>;

    /// Insert a lead. A rejected insert leaves the transaction usable.
    async fn insert_lead(&mut self, lead: &NewLead) -> Result<Lead>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Process-wide lead store
#[async_trait]
pub trait LeadStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn LeadTransaction>>;

    /// Leads matching the filter, newest first, with resolved names
    async fn export_leads(&self, filter: &ExportFilter) -> Result<Vec<LeadExportRow>>;

    async fn find_label(&self, id: Uuid) -> Result<Option<Label>>;

    /// Name of this store implementation
    fn name(&self) -> &'static str;
}

// =============================================================================
// In-memory store
// =============================================================================

#[derive(Debug, Default, Clone)]
struct MemoryState {
    leads: Vec<Lead>,
    brands: Vec<Brand>,
    labels: Vec<Label>,
    users: HashMap<Uuid, String>,
}

impl MemoryState {
    fn lead_by_phone(&self, phone: &str) -> Option<&Lead> {
        self.leads.iter().find(|l| l.phone == phone)
    }

    fn brand_by_name(&self, name: &str) -> Option<&Brand> {
        self.brands.iter().find(|b| b.name == name)
    }

    fn label_by_name(&self, name: &str) -> Option<&Label> {
        let wanted = name.to_lowercase();
        self.labels.iter().find(|l| l.name.to_lowercase() == wanted)
    }

    fn export_row(&self, lead: &Lead) -> LeadExportRow {
        let brand_name = lead
            .brand_id
            .and_then(|id| self.brands.iter().find(|b| b.id == id))
            .map(|b| b.name.clone());
        let label_name = lead
            .label_id
            .and_then(|id| self.labels.iter().find(|l| l.id == id))
            .map(|l| l.name.clone());

        LeadExportRow {
            id: lead.id,
            name: lead.name.clone(),
            phone: lead.phone.clone(),
            lead_date: lead.lead_date,
            brand_name,
            label_name,
            chat_status: lead.chat_status,
            city: lead.city.clone(),
            province: lead.province.clone(),
            creator_name: self.users.get(&lead.created_by).cloned(),
            webinar: lead.webinar,
            comment: lead.comment.clone(),
            created_at: lead.created_at,
            updated_at: lead.updated_at,
        }
    }
}

/// Same predicate as the SQL export query
fn row_matches(row: &LeadExportRow, lead: &Lead, filter: &ExportFilter) -> bool {
    if let Some(term) = filter.search_term() {
        let term = term.to_lowercase();
        let contains = |value: Option<&str>| value.is_some_and(|v| v.to_lowercase().contains(&term));
        let hit = contains(Some(&row.name))
            || contains(Some(&row.phone))
            || contains(Some(&row.city))
            || contains(Some(&row.province))
            || contains(row.brand_name.as_deref())
            || contains(row.label_name.as_deref())
            || contains(row.creator_name.as_deref());
        if !hit {
            return false;
        }
    }
    if filter.date_from.is_some_and(|from| row.lead_date < from) {
        return false;
    }
    if filter.date_to.is_some_and(|to| row.lead_date > to) {
        return false;
    }
    if filter.chat_status.is_some_and(|status| row.chat_status != status) {
        return false;
    }
    if filter.label_id.is_some() && lead.label_id != filter.label_id {
        return false;
    }
    if filter.created_by.is_some_and(|creator| lead.created_by != creator) {
        return false;
    }
    true
}

/// Lead store kept in process memory
#[derive(Debug, Clone, Default)]
pub struct MemoryLeadStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryLeadStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn add_label(&self, name: &str, color: &str) -> Label {
        let label = Label {
            id: Uuid::new_v4(),
            name: name.to_string(),
            color: color.to_string(),
        };
        self.state.lock().labels.push(label.clone());
        label
    }

    #[cfg(test)]
    pub fn add_user(&self, id: Uuid, name: &str) {
        self.state.lock().users.insert(id, name.to_string());
    }

    #[cfg(test)]
    pub fn leads(&self) -> Vec<Lead> {
        self.state.lock().leads.clone()
    }

    #[cfg(test)]
    pub fn brands(&self) -> Vec<Brand> {
        self.state.lock().brands.clone()
    }
}

#[async_trait]
impl LeadStore for MemoryLeadStore {
    async fn begin(&self) -> Result<Box<dyn LeadTransaction>> {
        let snapshot = self.state.lock().clone();
        Ok(Box::new(MemoryTransaction {
            shared: Arc::clone(&self.state),
            snapshot,
            new_leads: Vec::new(),
            new_brands: Vec::new(),
        }))
    }

    async fn export_leads(&self, filter: &ExportFilter) -> Result<Vec<LeadExportRow>> {
        let state = self.state.lock();
        let mut rows: Vec<(LeadExportRow, &Lead)> = state
            .leads
            .iter()
            .map(|lead| (state.export_row(lead), lead))
            .filter(|(row, lead)| row_matches(row, lead, filter))
            .collect();
        rows.sort_by(|a, b| b.0.created_at.cmp(&a.0.created_at));
        Ok(rows.into_iter().map(|(row, _)| row).collect())
    }

    async fn find_label(&self, id: Uuid) -> Result<Option<Label>> {
        Ok(self.state.lock().labels.iter().find(|l| l.id == id).cloned())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Writes are staged and only become visible to the store on commit
struct MemoryTransaction {
    shared: Arc<Mutex<MemoryState>>,
    snapshot: MemoryState,
    new_leads: Vec<Lead>,
    new_brands: Vec<Brand>,
}

#[async_trait]
impl LeadTransaction for MemoryTransaction {
    async fn find_lead_by_phone(&mut self, phone: &str) -> Result<Option<Uuid>> {
        Ok(self.snapshot.lead_by_phone(phone).map(|l| l.id))
    }

    async fn find_or_create_brand(&mut self, name: &str) -> Result<BrandLookup> {
        if let Some(brand) = self.snapshot.brand_by_name(name) {
            return Ok(BrandLookup { brand: brand.clone(), created: false });
        }
        let brand = Brand {
            id: Uuid::new_v4(),
            name: name.to_string(),
        };
        self.snapshot.brands.push(brand.clone());
        self.new_brands.push(brand.clone());
        Ok(BrandLookup { brand, created: true })
    }

    async fn find_label_by_name(&mut self, name: &str) -> Result<Option<Label>> {
        Ok(self.snapshot.label_by_name(name).cloned())
    }

    async fn insert_lead(&mut self, lead: &NewLead) -> Result<Lead> {
        if self.snapshot.lead_by_phone(&lead.phone).is_some() {
            bail!("duplicate key value violates unique constraint \"leads_phone_key\"");
        }
        let now = Utc::now();
        let stored = Lead {
            id: Uuid::new_v4(),
            name: lead.name.clone(),
            phone: lead.phone.clone(),
            lead_date: lead.lead_date,
            brand_id: lead.brand_id,
            label_id: lead.label_id,
            chat_status: lead.chat_status,
            city: lead.city.clone(),
            province: lead.province.clone(),
            webinar: lead.webinar,
            comment: lead.comment.clone(),
            created_by: lead.created_by,
            created_at: now,
            updated_at: now,
        };
        self.snapshot.leads.push(stored.clone());
        self.new_leads.push(stored.clone());
        Ok(stored)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MemoryTransaction { shared, mut new_leads, new_brands, .. } = *self;
        let mut state = shared.lock();
        if let Some(clash) = new_leads.iter().find(|l| state.lead_by_phone(&l.phone).is_some()) {
            bail!("duplicate key value violates unique constraint \"leads_phone_key\" ({})", clash.phone);
        }
        for brand in new_brands {
            match state.brand_by_name(&brand.name).map(|b| b.id) {
                // committed meanwhile by another transaction: point our leads at it
                Some(existing_id) => {
                    for lead in new_leads.iter_mut().filter(|l| l.brand_id == Some(brand.id)) {
                        lead.brand_id = Some(existing_id);
                    }
                }
                None => state.brands.push(brand),
            }
        }
        state.leads.extend(new_leads);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChatStatus, WebinarStatus};
    use chrono::NaiveDate;

    fn new_lead(phone: &str, creator: Uuid) -> NewLead {
        NewLead {
            name: "Siti".to_string(),
            phone: phone.to_string(),
            lead_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            brand_id: None,
            label_id: None,
            chat_status: ChatStatus::New,
            city: "Bandung".to_string(),
            province: "Jawa Barat".to_string(),
            webinar: WebinarStatus::None,
            comment: None,
            created_by: creator,
        }
    }

    #[tokio::test]
    async fn test_writes_invisible_until_commit() {
        let store = MemoryLeadStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.insert_lead(&new_lead("081111111111", Uuid::new_v4())).await.unwrap();

        assert!(store.leads().is_empty());
        assert!(tx.find_lead_by_phone("081111111111").await.unwrap().is_some());

        tx.commit().await.unwrap();
        assert_eq!(store.leads().len(), 1);
    }

    #[tokio::test]
    async fn test_rollback_discards_writes() {
        let store = MemoryLeadStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.insert_lead(&new_lead("081111111111", Uuid::new_v4())).await.unwrap();
        tx.find_or_create_brand("Brand A").await.unwrap();
        tx.rollback().await.unwrap();

        assert!(store.leads().is_empty());
        assert!(store.brands().is_empty());
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_phone() {
        let store = MemoryLeadStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.insert_lead(&new_lead("081111111111", Uuid::new_v4())).await.unwrap();
        let second = tx.insert_lead(&new_lead("081111111111", Uuid::new_v4())).await;
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn test_brand_created_once() {
        let store = MemoryLeadStore::new();
        let mut tx = store.begin().await.unwrap();
        let first = tx.find_or_create_brand("Brand A").await.unwrap();
        let second = tx.find_or_create_brand("Brand A").await.unwrap();
        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.brand.id, second.brand.id);
    }

    #[tokio::test]
    async fn test_concurrent_same_new_brand_keeps_leads_resolvable() {
        let store = MemoryLeadStore::new();
        let mut first = store.begin().await.unwrap();
        let mut second = store.begin().await.unwrap();

        for (tx, phone) in [(&mut first, "081111111111"), (&mut second, "082222222222")] {
            let brand = tx.find_or_create_brand("Brand A").await.unwrap();
            assert!(brand.created);
            let mut lead = new_lead(phone, Uuid::new_v4());
            lead.brand_id = Some(brand.brand.id);
            tx.insert_lead(&lead).await.unwrap();
        }
        first.commit().await.unwrap();
        second.commit().await.unwrap();

        let brands = store.brands();
        assert_eq!(brands.len(), 1);
        assert!(store.leads().iter().all(|l| l.brand_id == Some(brands[0].id)));
    }

    #[tokio::test]
    async fn test_concurrent_same_phone_fails_second_commit() {
        let store = MemoryLeadStore::new();
        let mut first = store.begin().await.unwrap();
        let mut second = store.begin().await.unwrap();
        first.insert_lead(&new_lead("081111111111", Uuid::new_v4())).await.unwrap();
        second.insert_lead(&new_lead("081111111111", Uuid::new_v4())).await.unwrap();

        first.commit().await.unwrap();
        let err = second.commit().await.unwrap_err();

        assert!(err.to_string().contains("leads_phone_key"));
        assert_eq!(store.leads().len(), 1);
    }

    #[tokio::test]
    async fn test_label_lookup_is_case_insensitive_exact() {
        let store = MemoryLeadStore::new();
        store.add_label("Hot Lead", "#ff0000");
        let mut tx = store.begin().await.unwrap();

        assert!(tx.find_label_by_name("hot lead").await.unwrap().is_some());
        assert!(tx.find_label_by_name("Hot").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_export_filters_by_creator_and_search() {
        let store = MemoryLeadStore::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        store.add_user(alice, "Alice");
        store.add_user(bob, "Bob");

        let mut tx = store.begin().await.unwrap();
        tx.insert_lead(&new_lead("081111111111", alice)).await.unwrap();
        tx.insert_lead(&new_lead("082222222222", bob)).await.unwrap();
        tx.commit().await.unwrap();

        let mine = store
            .export_leads(&ExportFilter { created_by: Some(alice), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].creator_name.as_deref(), Some("Alice"));

        let by_creator_name = store
            .export_leads(&ExportFilter { search: Some("bob".to_string()), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(by_creator_name.len(), 1);
        assert_eq!(by_creator_name[0].phone, "082222222222");
    }
}
