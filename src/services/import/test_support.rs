//! Helpers shared by the import tests

use rust_xlsxwriter::Workbook;

pub const HEADER: [&str; 12] = [
    "ID", "Name", "Phone", "Lead Date", "Brand", "Label", "Chat Status", "City", "Province",
    "Created By", "Webinar", "Comment",
];

/// Single-sheet xlsx with every non-empty value written as a string cell
pub fn workbook_bytes(rows: &[&[&str]]) -> Vec<u8> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    for (r, row) in rows.iter().enumerate() {
        for (c, value) in row.iter().enumerate() {
            if !value.is_empty() {
                worksheet.write_string(r as u32, c as u16, *value).unwrap();
            }
        }
    }
    workbook.save_to_buffer().unwrap()
}

/// Data row in import column order
pub fn lead_row(name: &str, phone: &str, date: &str) -> Vec<String> {
    vec![
        String::new(),
        name.to_string(),
        phone.to_string(),
        date.to_string(),
        String::new(),
        String::new(),
        "New".to_string(),
        "Jakarta".to_string(),
        "DKI Jakarta".to_string(),
        String::new(),
        String::new(),
        String::new(),
    ]
}

/// Workbook with the standard header followed by the given data rows
pub fn lead_sheet(rows: &[Vec<String>]) -> Vec<u8> {
    let owned: Vec<Vec<&str>> = rows
        .iter()
        .map(|row| row.iter().map(String::as_str).collect())
        .collect();
    let mut all: Vec<&[&str]> = vec![HEADER.as_slice()];
    all.extend(owned.iter().map(Vec::as_slice));
    workbook_bytes(&all)
}
