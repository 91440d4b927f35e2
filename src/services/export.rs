//! Filtered lead export workbook

use std::sync::Arc;

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Utc};
use rust_xlsxwriter::{Workbook, Worksheet, XlsxError};
use tracing::info;

use crate::auth::AuthInfo;
use crate::defaults::XLSX_CONTENT_TYPE;
use crate::services::lead_store::LeadStore;
use crate::services::template::IMPORT_COLUMNS;
use crate::services::xlsx_style::{ColumnKind, SheetColumn, SheetStyle};
use crate::types::{ExportFilter, FileDownload, LeadExportRow};

pub const LEADS_SHEET: &str = "Leads";
pub const INFO_SHEET: &str = "Export Info";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Import layout followed by the two timestamps, so an export can be
/// imported again
fn export_columns() -> Vec<SheetColumn> {
    let mut columns: Vec<SheetColumn> = IMPORT_COLUMNS
        .iter()
        .map(|c| SheetColumn::new(c.title, ColumnKind::Optional, c.width))
        .collect();
    columns[0].width = 38.0;
    columns.push(SheetColumn::new("Created At", ColumnKind::Optional, 20.0));
    columns.push(SheetColumn::new("Updated At", ColumnKind::Optional, 20.0));
    columns
}

/// Filter actually applied: non-privileged actors only ever see their own leads
pub fn effective_filter(actor: &AuthInfo, requested: ExportFilter) -> ExportFilter {
    if actor.is_privileged() {
        requested
    } else {
        ExportFilter {
            created_by: Some(actor.user_id),
            ..requested
        }
    }
}

/// `leads-export[-tags]-YYYYMMDD_HHMMSS.xlsx`
pub fn export_filename(filter: &ExportFilter, label_name: Option<&str>, now: DateTime<Utc>) -> String {
    let mut tags: Vec<String> = Vec::new();
    if let Some(term) = filter.search_term() {
        tags.push(slug(term));
    }
    match (filter.date_from, filter.date_to) {
        (Some(from), Some(to)) => tags.push(format!("{}-{}", from.format("%Y%m%d"), to.format("%Y%m%d"))),
        (Some(from), None) => tags.push(format!("from-{}", from.format("%Y%m%d"))),
        (None, Some(to)) => tags.push(format!("until-{}", to.format("%Y%m%d"))),
        (None, None) => {}
    }
    if let Some(status) = filter.chat_status {
        tags.push(status.as_str().replace('_', "-"));
    }
    if let Some(name) = label_name {
        tags.push(slug(name));
    }

    let tags: Vec<String> = tags.into_iter().filter(|t| !t.is_empty()).collect();
    let mut filename = "leads-export".to_string();
    for tag in tags {
        filename.push('-');
        filename.push_str(&tag);
    }
    format!("{}-{}.xlsx", filename, now.format("%Y%m%d_%H%M%S"))
}

fn slug(text: &str) -> String {
    let lowered: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    lowered
        .split('-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Builds lead exports from the store
pub struct ExportBuilder {
    store: Arc<dyn LeadStore>,
    style: SheetStyle,
}

impl ExportBuilder {
    pub fn new(store: Arc<dyn LeadStore>) -> Self {
        Self {
            store,
            style: SheetStyle::new(),
        }
    }

    pub async fn export(&self, actor: &AuthInfo, requested: ExportFilter) -> Result<FileDownload> {
        let now = Utc::now();
        let filter = effective_filter(actor, requested);

        let leads = self
            .store
            .export_leads(&filter)
            .await
            .context("Failed to load leads for export")?;

        let label_name = match filter.label_id {
            Some(id) => self
                .store
                .find_label(id)
                .await
                .context("Failed to load export label")?
                .map(|l| l.name),
            None => None,
        };

        let bytes = self.build_workbook(&leads, &filter, label_name.as_deref(), actor, now)?;
        let filename = export_filename(&filter, label_name.as_deref(), now);
        info!(
            "Exported {} leads for user {} as {}{}",
            leads.len(),
            actor.user_id,
            filename,
            if filter.is_empty() { " (unfiltered)" } else { "" }
        );

        Ok(FileDownload {
            filename,
            content_type: XLSX_CONTENT_TYPE.to_string(),
            size_bytes: bytes.len() as u64,
            file_base64: BASE64.encode(&bytes),
        })
    }

    pub fn build_workbook(
        &self,
        leads: &[LeadExportRow],
        filter: &ExportFilter,
        label_name: Option<&str>,
        actor: &AuthInfo,
        now: DateTime<Utc>,
    ) -> Result<Vec<u8>> {
        let mut workbook = Workbook::new();

        let sheet = workbook.add_worksheet();
        sheet.set_name(LEADS_SHEET)?;
        self.style.write_header(sheet, &export_columns())?;
        for (index, lead) in leads.iter().enumerate() {
            self.write_lead(sheet, index, lead)?;
        }

        let info = workbook.add_worksheet();
        info.set_name(INFO_SHEET)?;
        self.write_info(info, leads.len(), filter, label_name, actor, now)?;

        workbook.save_to_buffer().context("Failed to write lead export")
    }

    fn write_lead(&self, sheet: &mut Worksheet, index: usize, lead: &LeadExportRow) -> Result<(), XlsxError> {
        let row = index as u32 + 1;
        let format = self.style.body_for(index);
        let cells: [String; 14] = [
            lead.id.to_string(),
            lead.name.clone(),
            lead.phone.clone(),
            lead.lead_date.format("%Y-%m-%d").to_string(),
            lead.brand_name.clone().unwrap_or_default(),
            lead.label_name.clone().unwrap_or_default(),
            lead.chat_status.label().to_string(),
            lead.city.clone(),
            lead.province.clone(),
            lead.creator_name.clone().unwrap_or_default(),
            lead.webinar.label().to_string(),
            lead.comment.clone().unwrap_or_default(),
            lead.created_at.format(TIMESTAMP_FORMAT).to_string(),
            lead.updated_at.format(TIMESTAMP_FORMAT).to_string(),
        ];
        // phone and dates stay text so spreadsheet apps keep leading zeros
        for (col, value) in cells.iter().enumerate() {
            sheet.write_string_with_format(row, col as u16, value, format)?;
        }
        Ok(())
    }

    fn write_info(
        &self,
        sheet: &mut Worksheet,
        count: usize,
        filter: &ExportFilter,
        label_name: Option<&str>,
        actor: &AuthInfo,
        now: DateTime<Utc>,
    ) -> Result<(), XlsxError> {
        sheet.set_column_width(0, 22)?;
        sheet.set_column_width(1, 50)?;
        sheet.write_string_with_format(0, 0, "Lead Export", &self.style.title)?;

        let mut lines: Vec<(&str, String)> = vec![
            ("Exported At", format!("{} UTC", now.format(TIMESTAMP_FORMAT))),
            ("Exported By", actor.email.clone()),
            ("Total Records", count.to_string()),
        ];
        let filters = describe_filters(filter, label_name, actor);
        if filters.is_empty() {
            lines.push(("Filters", "None".to_string()));
        } else {
            lines.extend(filters);
        }

        for (index, (name, value)) in lines.iter().enumerate() {
            let row = index as u32 + 2;
            sheet.write_string_with_format(row, 0, *name, &self.style.label)?;
            sheet.write_string(row, 1, value)?;
        }
        Ok(())
    }
}

fn describe_filters(
    filter: &ExportFilter,
    label_name: Option<&str>,
    actor: &AuthInfo,
) -> Vec<(&'static str, String)> {
    let mut lines = Vec::new();
    if let Some(term) = filter.search_term() {
        lines.push(("Search", term.to_string()));
    }
    if let Some(from) = filter.date_from {
        lines.push(("Lead Date From", from.format("%Y-%m-%d").to_string()));
    }
    if let Some(to) = filter.date_to {
        lines.push(("Lead Date To", to.format("%Y-%m-%d").to_string()));
    }
    if let Some(status) = filter.chat_status {
        lines.push(("Chat Status", status.label().to_string()));
    }
    if let Some(id) = filter.label_id {
        lines.push(("Label", label_name.map(str::to_string).unwrap_or_else(|| id.to_string())));
    }
    if let Some(creator) = filter.created_by {
        let value = if creator == actor.user_id {
            "Own leads only".to_string()
        } else {
            creator.to_string()
        };
        lines.push(("Created By", value));
    }
    lines
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use calamine::{open_workbook_auto_from_rs, Data, Reader};
    use chrono::{NaiveDate, TimeZone};
    use uuid::Uuid;

    use super::*;
    use crate::auth::PERMISSION_VIEW_ALL;
    use crate::config::ImportSettings;
    use crate::services::import::{LeadImporter, NoProgress, UploadedFile};
    use crate::services::lead_store::{LeadTransaction, MemoryLeadStore};
    use crate::types::{ChatStatus, NewLead, WebinarStatus};

    fn actor(role: &str, permissions: &[&str]) -> AuthInfo {
        AuthInfo {
            user_id: Uuid::new_v4(),
            email: format!("{}@example.com", role),
            role: role.to_string(),
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
        }
    }

    fn lead(phone: &str, city: &str, creator: Uuid) -> NewLead {
        NewLead {
            name: format!("Lead {}", phone),
            phone: phone.to_string(),
            lead_date: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            brand_id: None,
            label_id: None,
            chat_status: ChatStatus::FollowUp,
            city: city.to_string(),
            province: "Jawa Timur".to_string(),
            webinar: WebinarStatus::Attended,
            comment: None,
            created_by: creator,
        }
    }

    async fn seed(store: &MemoryLeadStore, leads: &[NewLead]) {
        let mut tx = store.begin().await.unwrap();
        for lead in leads {
            tx.insert_lead(lead).await.unwrap();
        }
        tx.commit().await.unwrap();
    }

    fn read_sheet(bytes: &[u8], name: &str) -> calamine::Range<Data> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes)).unwrap();
        workbook.worksheet_range(name).unwrap()
    }

    #[test]
    fn test_non_privileged_actor_is_restricted_to_own_leads() {
        let sales = actor("sales", &[]);
        let someone_else = Uuid::new_v4();
        let filter = effective_filter(
            &sales,
            ExportFilter { created_by: Some(someone_else), ..Default::default() },
        );
        assert_eq!(filter.created_by, Some(sales.user_id));
    }

    #[test]
    fn test_privileged_actor_keeps_requested_filter() {
        let manager = actor("manager", &[PERMISSION_VIEW_ALL]);
        assert_eq!(effective_filter(&manager, ExportFilter::default()).created_by, None);

        let creator = Uuid::new_v4();
        let filter = effective_filter(
            &manager,
            ExportFilter { created_by: Some(creator), ..Default::default() },
        );
        assert_eq!(filter.created_by, Some(creator));
    }

    #[test]
    fn test_filename_tags() {
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap();
        assert_eq!(
            export_filename(&ExportFilter::default(), None, now),
            "leads-export-20240305_140709.xlsx"
        );

        let filter = ExportFilter {
            search: Some(" Jakarta Selatan ".to_string()),
            date_from: NaiveDate::from_ymd_opt(2024, 1, 1),
            chat_status: Some(ChatStatus::FollowUp2),
            ..Default::default()
        };
        assert_eq!(
            export_filename(&filter, Some("Hot Lead"), now),
            "leads-export-jakarta-selatan-from-20240101-followup-2-hot-lead-20240305_140709.xlsx"
        );
    }

    #[tokio::test]
    async fn test_export_sheets_and_rows() {
        let store = MemoryLeadStore::new();
        let admin = actor("admin", &[]);
        store.add_user(admin.user_id, "Admin");
        seed(&store, &[lead("081111111111", "Surabaya", admin.user_id), lead("082222222222", "Malang", admin.user_id)]).await;

        let download = ExportBuilder::new(Arc::new(store.clone()))
            .export(&admin, ExportFilter::default())
            .await
            .unwrap();
        assert!(download.filename.starts_with("leads-export-2"));
        let bytes = BASE64.decode(&download.file_base64).unwrap();

        let leads = read_sheet(&bytes, LEADS_SHEET);
        assert_eq!(leads.height(), 3);
        assert_eq!(leads.width(), 14);
        assert_eq!(leads.get((0, 6)).unwrap().to_string(), "Chat Status");
        assert_eq!(leads.get((1, 6)).unwrap().to_string(), "Follow Up");
        assert_eq!(leads.get((1, 9)).unwrap().to_string(), "Admin");
        assert_eq!(leads.get((1, 10)).unwrap().to_string(), "Yes");
        assert!(matches!(leads.get((1, 2)), Some(Data::String(_))));

        let info = read_sheet(&bytes, INFO_SHEET);
        assert_eq!(info.get((4, 0)).unwrap().to_string(), "Total Records");
        assert_eq!(info.get((4, 1)).unwrap().to_string(), "2");
        assert_eq!(info.get((5, 1)).unwrap().to_string(), "None");
    }

    #[tokio::test]
    async fn test_sales_export_contains_only_own_leads() {
        let store = MemoryLeadStore::new();
        let sales = actor("sales", &[]);
        seed(&store, &[lead("081111111111", "Surabaya", sales.user_id), lead("082222222222", "Malang", Uuid::new_v4())]).await;

        let download = ExportBuilder::new(Arc::new(store.clone()))
            .export(&sales, ExportFilter::default())
            .await
            .unwrap();
        let bytes = BASE64.decode(&download.file_base64).unwrap();

        let leads = read_sheet(&bytes, LEADS_SHEET);
        assert_eq!(leads.height(), 2);
        assert_eq!(leads.get((1, 2)).unwrap().to_string(), "081111111111");

        let info = read_sheet(&bytes, INFO_SHEET);
        assert_eq!(info.get((5, 0)).unwrap().to_string(), "Created By");
        assert_eq!(info.get((5, 1)).unwrap().to_string(), "Own leads only");
    }

    #[tokio::test]
    async fn test_exported_file_reimports_as_duplicates() {
        let store = MemoryLeadStore::new();
        let admin = actor("admin", &[]);
        seed(&store, &[lead("081111111111", "Surabaya", admin.user_id)]).await;

        let download = ExportBuilder::new(Arc::new(store.clone()))
            .export(&admin, ExportFilter::default())
            .await
            .unwrap();
        let bytes = BASE64.decode(&download.file_base64).unwrap();

        let importer = LeadImporter::new(Arc::new(store.clone()), ImportSettings::default());
        let file = UploadedFile {
            bytes: &bytes,
            declared_size: bytes.len() as u64,
            mime_type: XLSX_CONTENT_TYPE,
        };
        let result = importer.import_file(admin.user_id, &file, &NoProgress).await;

        assert_eq!(result.total_processed, 1);
        assert_eq!(result.imported, 0);
        assert_eq!(result.errors[0].message, "phone already exists");
    }
}
