//! Database row types, mapping directly to SQLite rows.
//! Distinct from leadboard-types models to keep the DB layer independent;
//! `into_model` validates ids and timestamps on the way out.
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::Row;
use uuid::Uuid;

use leadboard_types::models::{Board, Column, Lead, LeadOrigin};

pub struct BoardRow {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    pub description: Option<String>,
    pub webhook_token: String,
    pub created_at: String,
    pub updated_at: String,
}

pub struct ColumnRow {
    pub id: String,
    pub board_id: String,
    pub title: String,
    pub status: String,
    pub position: i32,
    pub created_at: String,
    pub updated_at: String,
}

pub struct LeadRow {
    pub id: String,
    pub board_id: String,
    pub column_id: String,
    pub name: String,
    pub phone: Option<String>,
    pub chat_id: Option<String>,
    pub description: Option<String>,
    pub origin: String,
    pub position: i32,
    pub created_at: String,
    pub updated_at: String,
}

/// A lead about to be inserted; position and column are decided by the
/// placement query.
#[derive(Debug, Clone)]
pub struct NewLead {
    pub name: String,
    pub phone: Option<String>,
    pub chat_id: Option<String>,
    pub description: Option<String>,
    pub origin: LeadOrigin,
}

/// Field edits for a lead. `None` leaves a field untouched; for the optional
/// fields `Some(None)` clears the value.
#[derive(Debug, Clone, Default)]
pub struct LeadChanges {
    pub name: Option<String>,
    pub phone: Option<Option<String>>,
    pub description: Option<Option<String>>,
}

pub(crate) const BOARD_COLUMNS: &str =
    "id, organization_id, name, description, webhook_token, created_at, updated_at";
pub(crate) const COLUMN_COLUMNS: &str = "id, board_id, title, status, position, created_at, updated_at";
pub(crate) const LEAD_COLUMNS: &str = "id, board_id, column_id, name, phone, chat_id, description, origin, position, created_at, updated_at";

impl BoardRow {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            organization_id: row.get(1)?,
            name: row.get(2)?,
            description: row.get(3)?,
            webhook_token: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    pub fn into_model(self) -> Result<Board> {
        Ok(Board {
            id: parse_id(&self.id)?,
            organization_id: parse_id(&self.organization_id)
                .with_context(|| format!("board {}", self.id))?,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
            name: self.name,
            description: self.description,
            webhook_token: self.webhook_token,
        })
    }
}

impl ColumnRow {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            board_id: row.get(1)?,
            title: row.get(2)?,
            status: row.get(3)?,
            position: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    pub fn into_model(self) -> Result<Column> {
        Ok(Column {
            id: parse_id(&self.id)?,
            board_id: parse_id(&self.board_id).with_context(|| format!("column {}", self.id))?,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
            title: self.title,
            status: self.status,
            position: self.position,
        })
    }
}

impl LeadRow {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            board_id: row.get(1)?,
            column_id: row.get(2)?,
            name: row.get(3)?,
            phone: row.get(4)?,
            chat_id: row.get(5)?,
            description: row.get(6)?,
            origin: row.get(7)?,
            position: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }

    pub fn into_model(self) -> Result<Lead> {
        let origin = self
            .origin
            .parse::<LeadOrigin>()
            .map_err(|e| anyhow::anyhow!("lead {}: {}", self.id, e))?;
        Ok(Lead {
            id: parse_id(&self.id)?,
            board_id: parse_id(&self.board_id).with_context(|| format!("lead {}", self.id))?,
            column_id: parse_id(&self.column_id).with_context(|| format!("lead {}", self.id))?,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
            name: self.name,
            phone: self.phone,
            chat_id: self.chat_id,
            description: self.description,
            origin,
            position: self.position,
        })
    }
}

fn parse_id(raw: &str) -> Result<Uuid> {
    raw.parse::<Uuid>().with_context(|| format!("corrupt id '{}'", raw))
}

/// Timestamps are written as RFC 3339. Rows created by SQLite's
/// `datetime('now')` are "YYYY-MM-DD HH:MM:SS" without timezone; those are
/// read as naive UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc()))
        .with_context(|| format!("corrupt timestamp '{}'", raw))
}

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}
