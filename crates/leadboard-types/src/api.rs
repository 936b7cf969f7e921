use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Board, Column, ColumnSeed, Lead};

// -- JWT Claims --

/// Session claims shared by the REST middleware and the realtime gateway.
/// Tokens are issued by the external identity provider with the same secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    /// Organization the caller acts for; every board is scoped to one.
    pub org: Uuid,
    pub exp: usize,
}

// -- Boards --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateBoardRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Seed columns; the default set is used when absent or empty.
    #[serde(default)]
    pub columns: Option<Vec<ColumnSeed>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateBoardRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateBoardResponse {
    pub board: Board,
    pub columns: Vec<Column>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookInfo {
    pub token: String,
    pub url: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct LeadQuery {
    /// Case-insensitive substring match on the lead name.
    pub search: Option<String>,
}

// -- Columns --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateColumnRequest {
    pub title: String,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateColumnRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

// -- Leads --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateLeadRequest {
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateLeadRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MoveLeadRequest {
    pub column_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MoveLeadResponse {
    /// False when the destination was the lead's current column.
    pub moved: bool,
    pub lead: Lead,
    /// Other leads whose position changed as part of the move.
    pub repositioned: Vec<Lead>,
}

// -- Webhook --

/// Inbound contact from the messaging platform. Every field is optional at
/// the wire level so that missing fields are reported as a 400 by the handler.
#[derive(Debug, Default, Deserialize)]
pub struct WebhookContact {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub chat_id: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
