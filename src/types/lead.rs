//! Lead, brand and label types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

/// Fallback for empty city/province cells
pub const UNKNOWN_LOCATION: &str = "Unknown";

/// Chat follow-up stage of a lead
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Type)]
#[sqlx(type_name = "chat_status")]
pub enum ChatStatus {
    #[default]
    #[serde(rename = "new")]
    #[sqlx(rename = "new")]
    New,
    #[serde(rename = "followup")]
    #[sqlx(rename = "followup")]
    FollowUp,
    #[serde(rename = "followup_2")]
    #[sqlx(rename = "followup_2")]
    FollowUp2,
    #[serde(rename = "followup_3")]
    #[sqlx(rename = "followup_3")]
    FollowUp3,
}

impl ChatStatus {
    /// Map free text from a spreadsheet cell. Unrecognized text is `New`.
    pub fn from_text(text: &str) -> Self {
        match text.trim().to_lowercase().as_str() {
            "follow up" | "followup" | "follow-up" => ChatStatus::FollowUp,
            _ => ChatStatus::New,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChatStatus::New => "new",
            ChatStatus::FollowUp => "followup",
            ChatStatus::FollowUp2 => "followup_2",
            ChatStatus::FollowUp3 => "followup_3",
        }
    }

    /// Human readable label used in exports
    pub fn label(&self) -> &'static str {
        match self {
            ChatStatus::New => "New",
            ChatStatus::FollowUp => "Follow Up",
            ChatStatus::FollowUp2 => "Follow Up 2",
            ChatStatus::FollowUp3 => "Follow Up 3",
        }
    }
}

/// Webinar attendance flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Type)]
#[sqlx(type_name = "webinar_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum WebinarStatus {
    #[default]
    None,
    Attended,
}

impl WebinarStatus {
    /// Only an explicit yes-like answer counts as attendance.
    pub fn from_text(text: &str) -> Self {
        match text.trim().to_lowercase().as_str() {
            "ikut" | "ya" | "yes" | "1" => WebinarStatus::Attended,
            _ => WebinarStatus::None,
        }
    }

    /// Export cell text; "Yes" maps back to `Attended` on re-import
    pub fn label(&self) -> &'static str {
        match self {
            WebinarStatus::None => "No",
            WebinarStatus::Attended => "Yes",
        }
    }
}

/// Lead entity
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub lead_date: NaiveDate,
    pub brand_id: Option<Uuid>,
    pub label_id: Option<Uuid>,
    pub chat_status: ChatStatus,
    pub city: String,
    pub province: String,
    pub webinar: WebinarStatus,
    pub comment: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Lead ready to be inserted
#[derive(Debug, Clone, PartialEq)]
pub struct NewLead {
    pub name: String,
    pub phone: String,
    pub lead_date: NaiveDate,
    pub brand_id: Option<Uuid>,
    pub label_id: Option<Uuid>,
    pub chat_status: ChatStatus,
    pub city: String,
    pub province: String,
    pub webinar: WebinarStatus,
    pub comment: Option<String>,
    pub created_by: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Brand {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Label {
    pub id: Uuid,
    pub name: String,
    pub color: String,
}

/// Lead joined with its brand, label and creator names
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LeadExportRow {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub lead_date: NaiveDate,
    pub brand_name: Option<String>,
    pub label_name: Option<String>,
    pub chat_status: ChatStatus,
    pub city: String,
    pub province: String,
    pub creator_name: Option<String>,
    pub webinar: WebinarStatus,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
