//! Import template workbook

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rust_xlsxwriter::Workbook;

use crate::defaults::XLSX_CONTENT_TYPE;
use crate::services::import::row_extractor::column;
use crate::services::xlsx_style::{ColumnKind, SheetColumn, SheetStyle};
use crate::types::FileDownload;

pub const TEMPLATE_FILENAME: &str = "template-import-leads.xlsx";
pub const TEMPLATE_SHEET: &str = "Import Leads";
pub const INSTRUCTIONS_SHEET: &str = "Instructions";

/// Import layout, in column order
pub const IMPORT_COLUMNS: [SheetColumn; column::COUNT] = [
    SheetColumn::new("ID", ColumnKind::Automatic, 10.0),
    SheetColumn::new("Name", ColumnKind::Required, 25.0),
    SheetColumn::new("Phone", ColumnKind::Required, 18.0),
    SheetColumn::new("Lead Date", ColumnKind::Required, 14.0),
    SheetColumn::new("Brand", ColumnKind::Optional, 18.0),
    SheetColumn::new("Label", ColumnKind::Optional, 16.0),
    SheetColumn::new("Chat Status", ColumnKind::Optional, 14.0),
    SheetColumn::new("City", ColumnKind::Optional, 16.0),
    SheetColumn::new("Province", ColumnKind::Optional, 18.0),
    SheetColumn::new("Created By", ColumnKind::Automatic, 16.0),
    SheetColumn::new("Webinar", ColumnKind::Optional, 12.0),
    SheetColumn::new("Comment", ColumnKind::Optional, 30.0),
];

/// Second row of the template; the name cell must contain '(' so the import
/// recognizes and drops it
const ANNOTATIONS: [&str; column::COUNT] = [
    "(automatic, leave empty)",
    "(required)",
    "(required, 10-15 digits)",
    "(required, YYYY-MM-DD)",
    "(optional, created if new)",
    "(optional, must already exist)",
    "(optional: New / Follow Up)",
    "(optional, default Unknown)",
    "(optional, default Unknown)",
    "(automatic, leave empty)",
    "(optional: Ikut / Tidak)",
    "(optional)",
];

const SAMPLE_ROWS: [[&str; column::COUNT]; 3] = [
    [
        "", "John Doe", "081234567890", "2024-01-15", "Brand A", "Hot Lead", "New", "Jakarta",
        "DKI Jakarta", "", "Ikut", "Interested in the premium package",
    ],
    [
        "", "Siti Rahma", "+6285712345678", "2024-01-16", "Brand A", "", "Follow Up", "Bandung",
        "Jawa Barat", "", "Tidak", "",
    ],
    [
        "", "Budi Santoso", "0896-1234-5678", "2024-01-17", "", "", "", "", "", "", "", "Call back next week",
    ],
];

const INSTRUCTIONS: [&str; 12] = [
    "Fill one lead per row in the 'Import Leads' sheet, starting below the grey notes row.",
    "Do not change the order of the columns and do not delete the header row.",
    "Columns marked * (red) are required: Name, Phone and Lead Date.",
    "Columns marked (auto) (grey: ID, Created By) are filled by the system and ignored on import.",
    "Phone: 10-15 digits, an optional leading + is kept, spaces and dashes are removed.",
    "Phone numbers must be unique; rows with an existing phone number are skipped.",
    "Lead Date: YYYY-MM-DD, DD/MM/YYYY, DD-MM-YYYY or DD.MM.YYYY, at most one year ahead.",
    "Brand: a brand that does not exist yet is created automatically.",
    "Label: must match an existing label name (case-insensitive), otherwise it is left empty.",
    "Chat Status: 'Follow Up' marks the lead for follow up; anything else imports as New.",
    "Webinar: 'Ikut', 'Ya', 'Yes' or '1' marks attendance; anything else means not attended.",
    "City and Province default to 'Unknown' when empty. Delete the sample rows before importing.",
];

/// Builds the downloadable import template. Needs no store access.
pub struct TemplateBuilder {
    style: SheetStyle,
}

impl Default for TemplateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateBuilder {
    pub fn new() -> Self {
        Self { style: SheetStyle::new() }
    }

    pub fn build(&self) -> Result<Vec<u8>> {
        let mut workbook = Workbook::new();

        let sheet = workbook.add_worksheet();
        sheet.set_name(TEMPLATE_SHEET)?;
        self.style.write_header(sheet, &IMPORT_COLUMNS)?;
        sheet.set_freeze_panes(2, 0)?;

        for (col, note) in ANNOTATIONS.iter().enumerate() {
            sheet.write_string_with_format(1, col as u16, *note, &self.style.annotation)?;
        }
        sheet.set_row_height(1, 30)?;

        for (index, sample) in SAMPLE_ROWS.iter().enumerate() {
            let row = index as u32 + 2;
            let format = self.style.body_for(index);
            for (col, value) in sample.iter().enumerate() {
                let col = col as u16;
                if value.is_empty() {
                    sheet.write_blank(row, col, format)?;
                } else {
                    sheet.write_string_with_format(row, col, *value, format)?;
                }
            }
        }

        let instructions = workbook.add_worksheet();
        instructions.set_name(INSTRUCTIONS_SHEET)?;
        instructions.set_column_width(0, 100)?;
        instructions.write_string_with_format(0, 0, "How to import leads", &self.style.title)?;
        for (index, line) in INSTRUCTIONS.iter().enumerate() {
            instructions.write_string(index as u32 + 2, 0, format!("{}. {}", index + 1, line))?;
        }

        workbook
            .save_to_buffer()
            .context("Failed to write import template")
    }

    pub fn download(&self) -> Result<FileDownload> {
        let bytes = self.build()?;
        Ok(FileDownload {
            filename: TEMPLATE_FILENAME.to_string(),
            content_type: XLSX_CONTENT_TYPE.to_string(),
            size_bytes: bytes.len() as u64,
            file_base64: BASE64.encode(&bytes),
        })
    }
}
