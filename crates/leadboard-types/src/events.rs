use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Column, Lead};
use crate::view::BoardView;

/// Change notifications pushed to subscribers of a board.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum BoardEvent {
    /// Full state sent once when a subscriber connects
    Snapshot(BoardView),

    LeadCreated(Lead),

    /// Any change to a lead row, including position and column moves
    LeadUpdated(Lead),

    LeadDeleted { board_id: Uuid, id: Uuid },

    ColumnCreated(Column),

    ColumnUpdated(Column),

    /// The column's leads are deleted with it
    ColumnDeleted { board_id: Uuid, id: Uuid },

    BoardDeleted { board_id: Uuid },
}

impl BoardEvent {
    /// The board this event belongs to. Subscribers only receive events of
    /// the board they are watching.
    pub fn board_id(&self) -> Uuid {
        match self {
            Self::Snapshot(view) => view.board.id,
            Self::LeadCreated(lead) | Self::LeadUpdated(lead) => lead.board_id,
            Self::ColumnCreated(column) | Self::ColumnUpdated(column) => column.board_id,
            Self::LeadDeleted { board_id, .. }
            | Self::ColumnDeleted { board_id, .. }
            | Self::BoardDeleted { board_id } => *board_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Snapshot(_) => "Snapshot",
            Self::LeadCreated(_) => "LeadCreated",
            Self::LeadUpdated(_) => "LeadUpdated",
            Self::LeadDeleted { .. } => "LeadDeleted",
            Self::ColumnCreated(_) => "ColumnCreated",
            Self::ColumnUpdated(_) => "ColumnUpdated",
            Self::ColumnDeleted { .. } => "ColumnDeleted",
            Self::BoardDeleted { .. } => "BoardDeleted",
        }
    }
}
