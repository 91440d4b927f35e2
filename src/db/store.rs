//! PostgreSQL implementation of the lead store

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::db::queries;
use crate::services::lead_store::{BrandLookup, LeadStore, LeadTransaction};
use crate::types::{ExportFilter, Label, Lead, LeadExportRow, NewLead};

/// Guards statements that may fail without aborting the import transaction
const ROW_SAVEPOINT: &str = "lead_row";

#[derive(Clone)]
pub struct PgLeadStore {
    pool: PgPool,
}

impl PgLeadStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LeadStore for PgLeadStore {
    async fn begin(&self) -> Result<Box<dyn LeadTransaction>> {
        let tx = self.pool.begin().await.context("Failed to begin transaction")?;
        Ok(Box::new(PgLeadTransaction { tx, poisoned: false }))
    }

    async fn export_leads(&self, filter: &ExportFilter) -> Result<Vec<LeadExportRow>> {
        queries::lead::export_leads(&self.pool, filter).await
    }

    async fn find_label(&self, id: Uuid) -> Result<Option<Label>> {
        queries::label::get_label(&self.pool, id).await
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}

pub struct PgLeadTransaction {
    tx: Transaction<'static, Postgres>,
    /// Set when a savepoint could not be settled; Postgres may have aborted
    /// the transaction and would turn COMMIT into a silent ROLLBACK
    poisoned: bool,
}

impl PgLeadTransaction {
    async fn savepoint(&mut self) -> Result<()> {
        let started = sqlx::query(&format!("SAVEPOINT {}", ROW_SAVEPOINT))
            .execute(&mut *self.tx)
            .await;
        if let Err(e) = started {
            self.poisoned = true;
            return Err(e).context("Failed to open row savepoint");
        }
        Ok(())
    }

    /// Release on success, roll back to the savepoint on failure
    async fn settle<T>(&mut self, outcome: Result<T>) -> Result<T> {
        let settled = sqlx::query(&settle_statement(outcome.is_ok()))
            .execute(&mut *self.tx)
            .await;
        if let Err(e) = settled {
            self.poisoned = true;
            return Err(e).context("Failed to settle row savepoint");
        }
        outcome
    }
}

fn settle_statement(succeeded: bool) -> String {
    if succeeded {
        format!("RELEASE SAVEPOINT {}", ROW_SAVEPOINT)
    } else {
        format!("ROLLBACK TO SAVEPOINT {}", ROW_SAVEPOINT)
    }
}

async fn find_or_create_brand(conn: &mut PgConnection, name: &str) -> Result<BrandLookup> {
    if let Some(brand) = queries::brand::find_brand_by_name(&mut *conn, name).await? {
        return Ok(BrandLookup { brand, created: false });
    }

    match queries::brand::create_brand(&mut *conn, name).await? {
        Some(brand) => Ok(BrandLookup { brand, created: true }),
        None => {
            let brand = queries::brand::find_brand_by_name(&mut *conn, name)
                .await?
                .with_context(|| format!("Brand '{}' vanished after insert conflict", name))?;
            Ok(BrandLookup { brand, created: false })
        }
    }
}

// Every statement of a row runs inside the row savepoint, so a failing
// lookup costs that row only.
#[async_trait]
impl LeadTransaction for PgLeadTransaction {
    async fn find_lead_by_phone(&mut self, phone: &str) -> Result<Option<Uuid>> {
        self.savepoint().await?;
        let found = queries::lead::find_lead_id_by_phone(&mut self.tx, phone).await;
        self.settle(found).await
    }

    async fn find_or_create_brand(&mut self, name: &str) -> Result<BrandLookup> {
        self.savepoint().await?;
        let lookup = find_or_create_brand(&mut self.tx, name).await;
        self.settle(lookup).await
    }

    async fn find_label_by_name(&mut self, name: &str) -> Result<Option<Label>> {
        self.savepoint().await?;
        let found = queries::label::find_label_by_name(&mut self.tx, name).await;
        self.settle(found).await
    }

    async fn insert_lead(&mut self, lead: &NewLead) -> Result<Lead> {
        self.savepoint().await?;
        let inserted = queries::lead::insert_lead(&mut self.tx, lead).await;
        self.settle(inserted).await
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        if self.poisoned {
            self.tx.rollback().await.context("Failed to roll back import")?;
            bail!("Import transaction was aborted by the database, nothing was saved");
        }
        self.tx.commit().await.context("Failed to commit import")?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await.context("Failed to roll back import")?;
        Ok(())
    }
}
