//! Shared styling for generated lead workbooks (template and export)

use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Worksheet, XlsxError};

const HEADER_BLUE: u32 = 0x1F4E79;
const REQUIRED_RED: u32 = 0xC00000;
const AUTO_GRAY: u32 = 0x808080;
const STRIPE_GRAY: u32 = 0xF2F2F2;
const NOTE_GRAY: u32 = 0x595959;

/// How a column is filled on import, shown in the template header color
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Required,
    Optional,
    /// Filled by the system, ignored on import
    Automatic,
}

/// Column of a generated sheet
#[derive(Debug, Clone, Copy)]
pub struct SheetColumn {
    pub title: &'static str,
    pub kind: ColumnKind,
    pub width: f64,
}

impl SheetColumn {
    pub const fn new(title: &'static str, kind: ColumnKind, width: f64) -> Self {
        Self { title, kind, width }
    }

    /// Header cell text, marked `*` when required and `(auto)` when automatic
    pub fn header_text(&self) -> String {
        match self.kind {
            ColumnKind::Required => format!("{} *", self.title),
            ColumnKind::Optional => self.title.to_string(),
            ColumnKind::Automatic => format!("{} (auto)", self.title),
        }
    }
}

pub struct SheetStyle {
    header: Format,
    required_header: Format,
    automatic_header: Format,
    pub annotation: Format,
    pub cell: Format,
    pub striped_cell: Format,
    pub title: Format,
    pub label: Format,
}

impl Default for SheetStyle {
    fn default() -> Self {
        Self::new()
    }
}

impl SheetStyle {
    pub fn new() -> Self {
        let header = Format::new()
            .set_bold()
            .set_font_color(Color::White)
            .set_background_color(Color::RGB(HEADER_BLUE))
            .set_border(FormatBorder::Thin)
            .set_align(FormatAlign::Center)
            .set_align(FormatAlign::VerticalCenter);
        let cell = Format::new().set_border(FormatBorder::Thin);

        Self {
            required_header: header.clone().set_background_color(Color::RGB(REQUIRED_RED)),
            automatic_header: header.clone().set_background_color(Color::RGB(AUTO_GRAY)),
            header,
            annotation: Format::new()
                .set_italic()
                .set_font_color(Color::RGB(NOTE_GRAY))
                .set_border(FormatBorder::Thin)
                .set_text_wrap(),
            striped_cell: cell.clone().set_background_color(Color::RGB(STRIPE_GRAY)),
            cell,
            title: Format::new().set_bold().set_font_size(14),
            label: Format::new().set_bold(),
        }
    }

    pub fn header_for(&self, kind: ColumnKind) -> &Format {
        match kind {
            ColumnKind::Required => &self.required_header,
            ColumnKind::Optional => &self.header,
            ColumnKind::Automatic => &self.automatic_header,
        }
    }

    /// Body format of a data row; every other row is shaded
    pub fn body_for(&self, data_index: usize) -> &Format {
        if data_index % 2 == 1 {
            &self.striped_cell
        } else {
            &self.cell
        }
    }

    /// Header row at row 0, column widths, frozen header
    pub fn write_header(&self, worksheet: &mut Worksheet, columns: &[SheetColumn]) -> Result<(), XlsxError> {
        for (col, column) in columns.iter().enumerate() {
            let col = col as u16;
            worksheet.write_string_with_format(0, col, column.header_text(), self.header_for(column.kind))?;
            worksheet.set_column_width(col, column.width)?;
        }
        worksheet.set_row_height(0, 22)?;
        worksheet.set_freeze_panes(1, 0)?;
        Ok(())
    }
}
