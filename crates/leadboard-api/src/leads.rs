use axum::{
    Extension, Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{debug, info};
use uuid::Uuid;

use leadboard_db::models::{LeadChanges, NewLead};
use leadboard_types::api::{
    Claims, CreateLeadRequest, LeadQuery, MoveLeadRequest, MoveLeadResponse, UpdateLeadRequest,
};
use leadboard_types::events::BoardEvent;
use leadboard_types::models::{LeadOrigin, normalize_phone};
use leadboard_types::view::name_matches;

use crate::error::{ApiError, optional_edit, required};
use crate::state::AppState;

pub async fn list_leads(
    State(state): State<AppState>,
    Path(board_id): Path<Uuid>,
    Query(query): Query<LeadQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    state.owned_board(board_id, &claims).await?;
    let mut leads = state.call(move |db| db.list_leads(board_id)).await?;
    if let Some(term) = query.search.as_deref() {
        leads.retain(|lead| name_matches(lead, term));
    }
    Ok(Json(leads))
}

/// POST /columns/{column_id}/leads: a manually entered lead, placed at the
/// bottom of the column.
pub async fn create_lead(
    State(state): State<AppState>,
    Path(column_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<CreateLeadRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let new = NewLead {
        name: required("name", Some(req.name.as_str()))?,
        phone: req.phone.as_deref().and_then(normalize_phone),
        chat_id: None,
        description: optional_edit(req.description).flatten(),
        origin: LeadOrigin::Manual,
    };

    let column = state.owned_column(column_id, &claims).await?;
    let placement = state
        .call(move |db| db.create_lead_appended(&column, new))
        .await?;

    state.dispatcher.publish(BoardEvent::LeadCreated(placement.lead.clone()));
    state
        .dispatcher
        .publish_all(placement.shifted.into_iter().map(BoardEvent::LeadUpdated));

    Ok((StatusCode::CREATED, Json(placement.lead)))
}

pub async fn update_lead(
    State(state): State<AppState>,
    Path(lead_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<UpdateLeadRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let changes = LeadChanges {
        name: req
            .name
            .as_deref()
            .map(|name| required("name", Some(name)))
            .transpose()?,
        phone: req.phone.map(|raw| normalize_phone(&raw)),
        description: optional_edit(req.description),
    };

    state.owned_lead(lead_id, &claims).await?;
    let lead = state
        .call(move |db| db.update_lead(lead_id, changes))
        .await?
        .ok_or_else(|| ApiError::not_found("lead"))?;

    state.dispatcher.publish(BoardEvent::LeadUpdated(lead.clone()));
    Ok(Json(lead))
}

/// DELETE /leads/{lead_id}: other leads in the column keep their positions.
pub async fn delete_lead(
    State(state): State<AppState>,
    Path(lead_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let lead = state.owned_lead(lead_id, &claims).await?;

    if !state.call(move |db| db.delete_lead(lead_id)).await? {
        return Err(ApiError::not_found("lead"));
    }

    state.dispatcher.publish(BoardEvent::LeadDeleted {
        board_id: lead.board_id,
        id: lead_id,
    });
    Ok(StatusCode::NO_CONTENT)
}

/// POST /leads/{lead_id}/move: the lead goes to the bottom of the
/// destination column. Moving into the current column is a no-op.
pub async fn move_lead(
    State(state): State<AppState>,
    Path(lead_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<MoveLeadRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let destination = req.column_id;

    let lead = state.owned_lead(lead_id, &claims).await?;
    let column = state.owned_column(destination, &claims).await?;
    if column.board_id != lead.board_id {
        return Err(ApiError::not_found("column"));
    }

    let outcome = state
        .call(move |db| Ok(db.move_lead(lead_id, destination)))
        .await?
        .map_err(|e| ApiError::internal("failed to move lead", e))?
        .ok_or_else(|| ApiError::not_found("lead"))?;

    if outcome.moved {
        info!("Lead {} moved to column {}", lead_id, destination);
        state.dispatcher.publish(BoardEvent::LeadUpdated(outcome.lead.clone()));
        state.dispatcher.publish_all(
            outcome
                .repositioned
                .iter()
                .cloned()
                .map(BoardEvent::LeadUpdated),
        );
    } else {
        debug!("Lead {} already in column {}", lead_id, destination);
    }

    Ok(Json(MoveLeadResponse {
        moved: outcome.moved,
        lead: outcome.lead,
        repositioned: outcome.repositioned,
    }))
}
