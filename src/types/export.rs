//! Export and download types

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ChatStatus;

/// Filters for a lead export, as requested by the client
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportFilter {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub date_from: Option<NaiveDate>,
    #[serde(default)]
    pub date_to: Option<NaiveDate>,
    #[serde(default)]
    pub chat_status: Option<ChatStatus>,
    #[serde(default)]
    pub label_id: Option<Uuid>,
    /// Ignored for non-privileged actors, who only see their own leads
    #[serde(default)]
    pub created_by: Option<Uuid>,
}

impl ExportFilter {
    /// Search text with surrounding whitespace removed, `None` when blank
    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.search_term().is_none()
            && self.date_from.is_none()
            && self.date_to.is_none()
            && self.chat_status.is_none()
            && self.label_id.is_none()
            && self.created_by.is_none()
    }
}

/// Spreadsheet returned to the client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDownload {
    pub filename: String,
    pub content_type: String,
    pub file_base64: String,
    pub size_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_search_is_ignored() {
        let filter = ExportFilter {
            search: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(filter.search_term().is_none());
        assert!(filter.is_empty());
    }

    #[test]
    fn test_filter_deserializes_from_camel_case() {
        let json = r#"{"search":"jakarta","dateFrom":"2024-01-01","chatStatus":"followup"}"#;
        let filter: ExportFilter = serde_json::from_str(json).unwrap();
        assert_eq!(filter.search_term(), Some("jakarta"));
        assert_eq!(filter.date_from, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(filter.chat_status, Some(ChatStatus::FollowUp));
        assert!(filter.label_id.is_none());
    }
}
