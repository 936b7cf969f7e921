use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// Secret that authorizes webhook intake for this board.
    pub webhook_token: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub id: Uuid,
    pub board_id: Uuid,
    pub title: String,
    pub status: String,
    /// Left-to-right order within the board.
    pub position: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: Uuid,
    pub board_id: Uuid,
    pub column_id: Uuid,
    pub name: String,
    pub phone: Option<String>,
    pub chat_id: Option<String>,
    pub description: Option<String>,
    pub origin: LeadOrigin,
    /// Top-to-bottom order within the column.
    pub position: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Where a lead came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeadOrigin {
    Whatsapp,
    Manual,
}

impl LeadOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Whatsapp => "whatsapp",
            Self::Manual => "manual",
        }
    }
}

impl fmt::Display for LeadOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeadOrigin {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "whatsapp" => Ok(Self::Whatsapp),
            "manual" => Ok(Self::Manual),
            other => Err(format!("unknown lead origin: {}", other)),
        }
    }
}

/// Column template used when seeding a new board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSeed {
    pub title: String,
    #[serde(default)]
    pub status: Option<String>,
}

impl ColumnSeed {
    pub fn new(title: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            status: Some(status.into()),
        }
    }

    /// The status label, falling back to the lowercased title.
    pub fn status_or_default(&self) -> String {
        self.status
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| default_status(&self.title))
    }

    /// Seed set used when a board is created without explicit columns.
    pub fn defaults() -> Vec<ColumnSeed> {
        vec![ColumnSeed::new("New Leads", "new")]
    }
}

pub fn default_status(title: &str) -> String {
    title.trim().to_lowercase()
}

/// Keep only the digits of a phone number. Returns `None` when nothing is left.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() { None } else { Some(digits) }
}
