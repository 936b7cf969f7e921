use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{info, warn};

use leadboard_db::models::NewLead;
use leadboard_types::api::WebhookContact;
use leadboard_types::events::BoardEvent;
use leadboard_types::models::LeadOrigin;

use crate::error::{ApiError, required};
use crate::state::AppState;

/// POST /api/webhook/{token}
///
/// Inbound contact from the messaging platform. The token in the path is the
/// only credential. The lead lands at the top of the board's first column.
///
/// The body is decoded as JSON regardless of `Content-Type`. Responds
/// `201 Created` with the lead.
pub async fn receive_lead(
    State(state): State<AppState>,
    Path(token): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let contact: WebhookContact = serde_json::from_slice(&body).map_err(|e| {
        warn!("Rejected webhook body: {}", e);
        ApiError::BadRequest(format!("invalid JSON body: {}", e))
    })?;

    let name = required("first_name", contact.first_name.as_deref())?;
    let chat_id = non_blank(contact.chat_id);
    let phone = non_blank(contact.phone).or_else(|| chat_id.clone());
    if chat_id.is_none() && phone.is_none() {
        warn!("Webhook contact without chat_id or phone");
        return Err(ApiError::BadRequest(
            "field \"chat_id\" or \"phone\" is required".into(),
        ));
    }

    let (board, column) = state
        .call(move |db| {
            let Some(board) = db.get_board_by_token(&token)? else {
                return Ok(None);
            };
            let column = db.first_column(board.id)?;
            Ok(Some((board, column)))
        })
        .await?
        .ok_or_else(|| ApiError::not_found("board"))?;
    let column = column.ok_or_else(|| ApiError::not_found("column"))?;

    let new = NewLead {
        name,
        phone,
        chat_id,
        description: None,
        origin: LeadOrigin::Whatsapp,
    };
    let placement = state
        .call(move |db| Ok(db.create_lead_at_head(&column, new)))
        .await?
        .map_err(|e| ApiError::internal("failed to process lead", e))?;

    info!("Webhook lead {} added to board {}", placement.lead.id, board.id);
    state.dispatcher.publish(BoardEvent::LeadCreated(placement.lead.clone()));
    state
        .dispatcher
        .publish_all(placement.shifted.into_iter().map(BoardEvent::LeadUpdated));

    Ok((StatusCode::CREATED, Json(placement.lead)))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
