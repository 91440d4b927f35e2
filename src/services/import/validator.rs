//! Row-level business rule validation

use chrono::{Duration, Months, NaiveDate, NaiveDateTime, Utc};
use thiserror::Error;

use super::row_extractor::{column, RawRow};

const PHONE_MIN_LEN: usize = 10;
const PHONE_MAX_LEN: usize = 15;

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y"];
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Largest serial Excel accepts (9999-12-31)
const EXCEL_MAX_SERIAL: f64 = 2_958_465.0;

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum RowValidationError {
    #[error("{field} is required")]
    MissingField { field: &'static str },

    #[error("invalid phone format")]
    InvalidPhoneFormat,

    #[error("invalid date format")]
    InvalidDate,

    #[error("lead date is more than one year in the future")]
    FutureDateExceeded,
}

impl RowValidationError {
    pub fn field(&self) -> &'static str {
        match self {
            RowValidationError::MissingField { field } => field,
            RowValidationError::InvalidPhoneFormat => "phone",
            RowValidationError::InvalidDate | RowValidationError::FutureDateExceeded => "lead_date",
        }
    }

    /// Sheet column the error refers to
    pub fn column(&self) -> usize {
        match self.field() {
            "name" => column::NAME,
            "phone" => column::PHONE,
            _ => column::LEAD_DATE,
        }
    }
}

/// Row that passed validation, with the free-text columns still raw
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidRow {
    pub line: u32,
    pub name: String,
    /// Normalized: digits with an optional leading `+`
    pub phone: String,
    pub lead_date: NaiveDate,
    pub brand: String,
    pub label: String,
    pub chat_status: String,
    pub city: String,
    pub province: String,
    pub webinar: String,
    pub comment: String,
}

#[derive(Debug, Clone, Copy)]
pub struct RowValidator {
    today: NaiveDate,
}

impl RowValidator {
    pub fn new(today: NaiveDate) -> Self {
        Self { today }
    }

    pub fn today() -> Self {
        Self::new(Utc::now().date_naive())
    }

    /// Runs every check and reports all failures of the row at once
    pub fn validate(&self, row: &RawRow) -> Result<ValidRow, Vec<RowValidationError>> {
        let mut errors = Vec::new();

        let name = row.cell(column::NAME);
        let raw_phone = row.cell(column::PHONE);
        let raw_date = row.cell(column::LEAD_DATE);

        if name.is_empty() {
            errors.push(RowValidationError::MissingField { field: "name" });
        }

        let phone = normalize_phone(raw_phone);
        if raw_phone.is_empty() {
            errors.push(RowValidationError::MissingField { field: "phone" });
        } else if !(PHONE_MIN_LEN..=PHONE_MAX_LEN).contains(&phone.len()) {
            errors.push(RowValidationError::InvalidPhoneFormat);
        }

        let mut lead_date = None;
        if raw_date.is_empty() {
            errors.push(RowValidationError::MissingField { field: "lead_date" });
        } else {
            match parse_lead_date(raw_date, row.is_numeric(column::LEAD_DATE)) {
                Some(date) if date > self.latest_allowed_date() => {
                    errors.push(RowValidationError::FutureDateExceeded)
                }
                Some(date) => lead_date = Some(date),
                None => errors.push(RowValidationError::InvalidDate),
            }
        }

        match lead_date {
            Some(lead_date) if errors.is_empty() => Ok(ValidRow {
                line: row.line,
                name: name.to_string(),
                phone,
                lead_date,
                brand: row.cell(column::BRAND).to_string(),
                label: row.cell(column::LABEL).to_string(),
                chat_status: row.cell(column::CHAT_STATUS).to_string(),
                city: row.cell(column::CITY).to_string(),
                province: row.cell(column::PROVINCE).to_string(),
                webinar: row.cell(column::WEBINAR).to_string(),
                comment: row.cell(column::COMMENT).to_string(),
            }),
            _ => Err(errors),
        }
    }

    fn latest_allowed_date(&self) -> NaiveDate {
        self.today
            .checked_add_months(Months::new(12))
            .unwrap_or(NaiveDate::MAX)
    }
}

/// Keeps digits and a leading `+`; everything else is formatting
pub fn normalize_phone(raw: &str) -> String {
    let trimmed = raw.trim();
    let mut phone = String::with_capacity(trimmed.len());
    if trimmed.starts_with('+') {
        phone.push('+');
    }
    phone.extend(trimmed.chars().filter(char::is_ascii_digit));
    phone
}

/// Accepts ISO dates and day-first dates. An Excel serial day number is only
/// accepted when it came from a number cell; digits typed as text are not a date.
pub fn parse_lead_date(raw: &str, from_number_cell: bool) -> Option<NaiveDate> {
    let raw = raw.trim();

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return Some(date);
        }
    }
    for format in DATETIME_FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(datetime.date());
        }
    }

    if !from_number_cell {
        return None;
    }
    let serial: f64 = raw.parse().ok()?;
    if !(1.0..=EXCEL_MAX_SERIAL).contains(&serial) {
        return None;
    }
    // 1900 date system, counting the phantom 1900-02-29
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(Duration::days(serial.trunc() as i64))
}
