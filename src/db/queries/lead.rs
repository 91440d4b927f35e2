//! Lead database queries

use anyhow::Result;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::types::{ExportFilter, Lead, LeadExportRow, NewLead};

/// Id of the lead owning this (normalized) phone
pub async fn find_lead_id_by_phone(conn: &mut PgConnection, phone: &str) -> Result<Option<Uuid>> {
    let id = sqlx::query_scalar::<_, Uuid>("SELECT id FROM leads WHERE phone = $1")
        .bind(phone)
        .fetch_optional(conn)
        .await?;

    Ok(id)
}

/// Insert a new lead
pub async fn insert_lead(conn: &mut PgConnection, lead: &NewLead) -> Result<Lead> {
    let lead = sqlx::query_as::<_, Lead>(
        r#"
        INSERT INTO leads (
            id, name, phone, lead_date, brand_id, label_id, chat_status,
            city, province, webinar, comment, created_by, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, NOW(), NOW())
        RETURNING
            id, name, phone, lead_date, brand_id, label_id, chat_status,
            city, province, webinar, comment, created_by, created_at, updated_at
        "#
    )
    .bind(Uuid::new_v4())
    .bind(&lead.name)
    .bind(&lead.phone)
    .bind(lead.lead_date)
    .bind(lead.brand_id)
    .bind(lead.label_id)
    .bind(lead.chat_status)
    .bind(&lead.city)
    .bind(&lead.province)
    .bind(lead.webinar)
    .bind(&lead.comment)
    .bind(lead.created_by)
    .fetch_one(conn)
    .await?;

    Ok(lead)
}

/// Leads matching an export filter, newest first.
///
/// Search is a case-insensitive substring match over the lead's own text
/// columns and the brand, label and creator names.
pub async fn export_leads(pool: &PgPool, filter: &ExportFilter) -> Result<Vec<LeadExportRow>> {
    let pattern = filter.search_term().map(|term| format!("%{}%", escape_like(term)));

    let rows = sqlx::query_as::<_, LeadExportRow>(
        r#"
        SELECT
            l.id, l.name, l.phone, l.lead_date,
            b.name AS brand_name,
            lb.name AS label_name,
            l.chat_status, l.city, l.province,
            u.name AS creator_name,
            l.webinar, l.comment, l.created_at, l.updated_at
        FROM leads l
        LEFT JOIN brands b ON b.id = l.brand_id
        LEFT JOIN labels lb ON lb.id = l.label_id
        LEFT JOIN users u ON u.id = l.created_by
        WHERE ($1::text IS NULL
                OR l.name ILIKE $1 OR l.phone ILIKE $1
                OR l.city ILIKE $1 OR l.province ILIKE $1
                OR b.name ILIKE $1 OR lb.name ILIKE $1 OR u.name ILIKE $1)
          AND ($2::date IS NULL OR l.lead_date >= $2)
          AND ($3::date IS NULL OR l.lead_date <= $3)
          AND ($4::chat_status IS NULL OR l.chat_status = $4)
          AND ($5::uuid IS NULL OR l.label_id = $5)
          AND ($6::uuid IS NULL OR l.created_by = $6)
        ORDER BY l.created_at DESC
        "#
    )
    .bind(pattern)
    .bind(filter.date_from)
    .bind(filter.date_to)
    .bind(filter.chat_status)
    .bind(filter.label_id)
    .bind(filter.created_by)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Escape LIKE wildcards so user input matches literally
fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}
