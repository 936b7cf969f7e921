use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use uuid::Uuid;

use leadboard_types::models::{Board, Column, ColumnSeed, Lead};
use leadboard_types::ordering::{self, PositionUpdate};

use crate::Database;
use crate::models::{
    BOARD_COLUMNS, BoardRow, COLUMN_COLUMNS, ColumnRow, LEAD_COLUMNS, LeadChanges, LeadRow, NewLead,
    format_timestamp,
};
use crate::token::generate_webhook_token;

/// A freshly inserted lead plus the leads that were renumbered to make room.
#[derive(Debug)]
pub struct Placement {
    pub lead: Lead,
    pub shifted: Vec<Lead>,
}

#[derive(Debug)]
pub struct MoveOutcome {
    pub moved: bool,
    pub lead: Lead,
    pub repositioned: Vec<Lead>,
}

impl Database {
    // -- Boards --

    /// Insert a board and its seed columns in one transaction. If any column
    /// fails to insert, the board is not created either.
    pub fn create_board(
        &self,
        organization_id: Uuid,
        name: &str,
        description: Option<&str>,
        seeds: &[ColumnSeed],
    ) -> Result<(Board, Vec<Column>)> {
        self.with_tx(|tx| {
            let id = Uuid::new_v4();
            let now = format_timestamp(Utc::now());
            tx.execute(
                "INSERT INTO boards (id, organization_id, name, description, webhook_token, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                params![
                    id.to_string(),
                    organization_id.to_string(),
                    name,
                    description,
                    generate_webhook_token(),
                    now,
                ],
            )
            .context("Failed to insert board")?;

            for (position, seed) in seeds.iter().enumerate() {
                insert_column(tx, id, &seed.title, &seed.status_or_default(), position as i32, &now)
                    .with_context(|| format!("Failed to insert seed column '{}'", seed.title))?;
            }

            let board = query_board(tx, "WHERE id = ?1", [id.to_string()])?
                .context("Board not found after insert")?;
            let columns = query_columns_of(tx, id)?;
            Ok((board, columns))
        })
    }

    pub fn list_boards(&self, organization_id: Uuid) -> Result<Vec<Board>> {
        self.with_conn(|conn| {
            query_boards(
                conn,
                "WHERE organization_id = ?1 ORDER BY created_at, id",
                [organization_id.to_string()],
            )
        })
    }

    pub fn get_board(&self, id: Uuid) -> Result<Option<Board>> {
        self.with_conn(|conn| query_board(conn, "WHERE id = ?1", [id.to_string()]))
    }

    pub fn get_board_by_token(&self, token: &str) -> Result<Option<Board>> {
        self.with_conn(|conn| query_board(conn, "WHERE webhook_token = ?1", [token]))
    }

    /// `description: Some(None)` clears the description.
    pub fn update_board(
        &self,
        id: Uuid,
        name: Option<&str>,
        description: Option<Option<&str>>,
    ) -> Result<Option<Board>> {
        self.with_tx(|tx| {
            let Some(board) = query_board(tx, "WHERE id = ?1", [id.to_string()])? else {
                return Ok(None);
            };
            let name = name.unwrap_or(&board.name);
            let description = match description {
                Some(value) => value,
                None => board.description.as_deref(),
            };
            tx.execute(
                "UPDATE boards SET name = ?1, description = ?2, updated_at = ?3 WHERE id = ?4",
                params![name, description, format_timestamp(Utc::now()), id.to_string()],
            )
            .context("Failed to update board")?;
            query_board(tx, "WHERE id = ?1", [id.to_string()])
        })
    }

    /// Deletes the board with all of its columns and leads.
    pub fn delete_board(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let count = conn
                .execute("DELETE FROM boards WHERE id = ?1", [id.to_string()])
                .context("Failed to delete board")?;
            Ok(count > 0)
        })
    }

    // -- Columns --

    pub fn list_columns(&self, board_id: Uuid) -> Result<Vec<Column>> {
        self.with_conn(|conn| query_columns_of(conn, board_id))
    }

    pub fn get_column(&self, id: Uuid) -> Result<Option<Column>> {
        self.with_conn(|conn| query_column(conn, id))
    }

    /// The leftmost column of a board, where inbound leads land.
    pub fn first_column(&self, board_id: Uuid) -> Result<Option<Column>> {
        self.with_conn(|conn| {
            Ok(query_columns(
                conn,
                "WHERE board_id = ?1 ORDER BY position, created_at, id LIMIT 1",
                [board_id.to_string()],
            )?
            .pop())
        })
    }

    /// Add a column after the current rightmost one.
    pub fn create_column(&self, board_id: Uuid, title: &str, status: &str) -> Result<Column> {
        self.with_tx(|tx| {
            let next: i32 = tx.query_row(
                "SELECT COALESCE(MAX(position), -1) + 1 FROM board_columns WHERE board_id = ?1",
                [board_id.to_string()],
                |row| row.get(0),
            )?;
            let now = format_timestamp(Utc::now());
            let id = insert_column(tx, board_id, title, status, next, &now)
                .context("Failed to insert column")?;
            query_column(tx, id)?.context("Column not found after insert")
        })
    }

    pub fn update_column(
        &self,
        id: Uuid,
        title: Option<&str>,
        status: Option<&str>,
    ) -> Result<Option<Column>> {
        self.with_tx(|tx| {
            let Some(column) = query_column(tx, id)? else {
                return Ok(None);
            };
            tx.execute(
                "UPDATE board_columns SET title = ?1, status = ?2, updated_at = ?3 WHERE id = ?4",
                params![
                    title.unwrap_or(&column.title),
                    status.unwrap_or(&column.status),
                    format_timestamp(Utc::now()),
                    id.to_string(),
                ],
            )
            .context("Failed to update column")?;
            query_column(tx, id)
        })
    }

    /// Deletes the column and every lead in it. Sibling columns keep their positions.
    pub fn delete_column(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let count = conn
                .execute("DELETE FROM board_columns WHERE id = ?1", [id.to_string()])
                .context("Failed to delete column")?;
            Ok(count > 0)
        })
    }

    // -- Leads --

    pub fn list_leads(&self, board_id: Uuid) -> Result<Vec<Lead>> {
        self.with_conn(|conn| {
            query_leads(
                conn,
                "WHERE board_id = ?1 ORDER BY position, created_at, id",
                [board_id.to_string()],
            )
        })
    }

    pub fn get_lead(&self, id: Uuid) -> Result<Option<Lead>> {
        self.with_conn(|conn| query_lead(conn, id))
    }

    /// Manual creation: the column is compacted and the lead goes to the bottom.
    pub fn create_lead_appended(&self, column: &Column, new: NewLead) -> Result<Placement> {
        self.place_lead(column, new, false)
    }

    /// Webhook intake: the column is shifted down and the lead takes position 0.
    pub fn create_lead_at_head(&self, column: &Column, new: NewLead) -> Result<Placement> {
        self.place_lead(column, new, true)
    }

    fn place_lead(&self, column: &Column, new: NewLead, at_head: bool) -> Result<Placement> {
        self.with_tx(|tx| {
            let existing = query_leads(
                tx,
                "WHERE column_id = ?1 ORDER BY position, created_at, id",
                [column.id.to_string()],
            )?;
            let (updates, position) = if at_head {
                (ordering::plan_head_insert(&existing, column.id), 0)
            } else {
                ordering::plan_append(&existing, column.id)
            };

            let now = Utc::now();
            apply_position_updates(tx, &updates, now)?;

            let id = Uuid::new_v4();
            let ts = format_timestamp(now);
            tx.execute(
                &format!(
                    "INSERT INTO leads ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
                    LEAD_COLUMNS
                ),
                params![
                    id.to_string(),
                    column.board_id.to_string(),
                    column.id.to_string(),
                    new.name,
                    new.phone,
                    new.chat_id,
                    new.description,
                    new.origin.as_str(),
                    position,
                    ts,
                ],
            )
            .context("Failed to insert lead")?;

            let lead = query_lead(tx, id)?.context("Lead not found after insert")?;
            let shifted = query_updated(tx, &updates)?;
            Ok(Placement { lead, shifted })
        })
    }

    pub fn update_lead(&self, id: Uuid, changes: LeadChanges) -> Result<Option<Lead>> {
        self.with_tx(|tx| {
            let Some(lead) = query_lead(tx, id)? else {
                return Ok(None);
            };
            let name = changes.name.unwrap_or(lead.name);
            let phone = changes.phone.unwrap_or(lead.phone);
            let description = changes.description.unwrap_or(lead.description);
            tx.execute(
                "UPDATE leads SET name = ?1, phone = ?2, description = ?3, updated_at = ?4 WHERE id = ?5",
                params![name, phone, description, format_timestamp(Utc::now()), id.to_string()],
            )
            .context("Failed to update lead")?;
            query_lead(tx, id)
        })
    }

    /// Deletes exactly one lead. Remaining leads keep their positions.
    pub fn delete_lead(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let count = conn
                .execute("DELETE FROM leads WHERE id = ?1", [id.to_string()])
                .context("Failed to delete lead")?;
            Ok(count > 0)
        })
    }

    /// Move a lead to the bottom of `destination` and compact the column it
    /// left. Returns `None` if the lead or the column does not exist, or if
    /// they belong to different boards. A move into the lead's own column
    /// changes nothing.
    pub fn move_lead(&self, lead_id: Uuid, destination: Uuid) -> Result<Option<MoveOutcome>> {
        self.with_tx(|tx| {
            let Some(lead) = query_lead(tx, lead_id)? else {
                return Ok(None);
            };
            let Some(column) = query_column(tx, destination)? else {
                return Ok(None);
            };
            if column.board_id != lead.board_id {
                return Ok(None);
            }

            let affected = query_leads(
                tx,
                "WHERE column_id IN (?1, ?2) ORDER BY position, created_at, id",
                [lead.column_id.to_string(), destination.to_string()],
            )?;
            let plan = ordering::plan_move(&affected, lead_id, destination)
                .context("Lead missing from its own column")?;

            if !plan.moved {
                return Ok(Some(MoveOutcome {
                    moved: false,
                    lead,
                    repositioned: Vec::new(),
                }));
            }

            let now = Utc::now();
            apply_position_updates(tx, &plan.updates, now)?;
            apply_position_updates(tx, &[plan.target], now)?;

            let lead = query_lead(tx, lead_id)?.context("Lead not found after move")?;
            let repositioned = query_updated(tx, &plan.updates)?;
            Ok(Some(MoveOutcome {
                moved: true,
                lead,
                repositioned,
            }))
        })
    }
}

fn insert_column(
    conn: &Connection,
    board_id: Uuid,
    title: &str,
    status: &str,
    position: i32,
    now: &str,
) -> Result<Uuid> {
    let id = Uuid::new_v4();
    conn.execute(
        &format!(
            "INSERT INTO board_columns ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            COLUMN_COLUMNS
        ),
        params![id.to_string(), board_id.to_string(), title, status, position, now],
    )?;
    Ok(id)
}

fn apply_position_updates(conn: &Connection, updates: &[PositionUpdate], now: DateTime<Utc>) -> Result<()> {
    if updates.is_empty() {
        return Ok(());
    }
    let ts = format_timestamp(now);
    let mut stmt =
        conn.prepare("UPDATE leads SET column_id = ?1, position = ?2, updated_at = ?3 WHERE id = ?4")?;
    for update in updates {
        stmt.execute(params![
            update.column_id.to_string(),
            update.position,
            ts,
            update.id.to_string(),
        ])
        .with_context(|| format!("Failed to reposition lead {}", update.id))?;
    }
    Ok(())
}

/// Re-read the leads touched by `updates`, in the order of the updates.
fn query_updated(conn: &Connection, updates: &[PositionUpdate]) -> Result<Vec<Lead>> {
    updates
        .iter()
        .map(|u| query_lead(conn, u.id)?.with_context(|| format!("Lead {} vanished", u.id)))
        .collect()
}

fn query_boards<P: rusqlite::Params>(conn: &Connection, clause: &str, params: P) -> Result<Vec<Board>> {
    let mut stmt = conn.prepare(&format!("SELECT {} FROM boards {}", BOARD_COLUMNS, clause))?;
    let rows = stmt
        .query_map(params, BoardRow::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    rows.into_iter().map(BoardRow::into_model).collect()
}

fn query_board<P: rusqlite::Params>(conn: &Connection, clause: &str, params: P) -> Result<Option<Board>> {
    let mut stmt = conn.prepare(&format!("SELECT {} FROM boards {}", BOARD_COLUMNS, clause))?;
    stmt.query_row(params, BoardRow::from_row)
        .optional()?
        .map(BoardRow::into_model)
        .transpose()
}

fn query_columns<P: rusqlite::Params>(conn: &Connection, clause: &str, params: P) -> Result<Vec<Column>> {
    let mut stmt = conn.prepare(&format!("SELECT {} FROM board_columns {}", COLUMN_COLUMNS, clause))?;
    let rows = stmt
        .query_map(params, ColumnRow::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    rows.into_iter().map(ColumnRow::into_model).collect()
}

fn query_columns_of(conn: &Connection, board_id: Uuid) -> Result<Vec<Column>> {
    query_columns(
        conn,
        "WHERE board_id = ?1 ORDER BY position, created_at, id",
        [board_id.to_string()],
    )
}

fn query_column(conn: &Connection, id: Uuid) -> Result<Option<Column>> {
    Ok(query_columns(conn, "WHERE id = ?1", [id.to_string()])?.pop())
}

fn query_leads<P: rusqlite::Params>(conn: &Connection, clause: &str, params: P) -> Result<Vec<Lead>> {
    let mut stmt = conn.prepare(&format!("SELECT {} FROM leads {}", LEAD_COLUMNS, clause))?;
    let rows = stmt
        .query_map(params, LeadRow::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    rows.into_iter().map(LeadRow::into_model).collect()
}

fn query_lead(conn: &Connection, id: Uuid) -> Result<Option<Lead>> {
    Ok(query_leads(conn, "WHERE id = ?1", [id.to_string()])?.pop())
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
