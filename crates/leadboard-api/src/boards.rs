use axum::{
    Extension, Json,
    extract::{Path, Query, State, WebSocketUpgrade, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use leadboard_gateway::connection;
use leadboard_types::api::{
    Claims, CreateBoardRequest, CreateBoardResponse, LeadQuery, UpdateBoardRequest, WebhookInfo,
};
use leadboard_types::events::BoardEvent;
use leadboard_types::models::ColumnSeed;
use leadboard_types::view::{BoardView, name_matches};

use crate::error::{ApiError, optional_edit, required};
use crate::state::AppState;

pub async fn list_boards(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let org = claims.org;
    let boards = state.call(move |db| db.list_boards(org)).await?;
    Ok(Json(boards))
}

/// POST /boards: board and seed columns are created atomically.
pub async fn create_board(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<CreateBoardRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let name = required("name", Some(req.name.as_str()))?;
    let description = optional_edit(req.description).flatten();

    let seeds = match req.columns {
        Some(columns) if !columns.is_empty() => columns
            .into_iter()
            .map(|seed| -> Result<ColumnSeed, ApiError> {
                Ok(ColumnSeed {
                    title: required("columns.title", Some(seed.title.as_str()))?,
                    status: seed.status,
                })
            })
            .collect::<Result<Vec<_>, ApiError>>()?,
        _ => ColumnSeed::defaults(),
    };

    let org = claims.org;
    let (board, columns) = state
        .call(move |db| db.create_board(org, &name, description.as_deref(), &seeds))
        .await?;

    info!("Board {} created for organization {}", board.id, org);
    Ok((StatusCode::CREATED, Json(CreateBoardResponse { board, columns })))
}

/// GET /boards/{board_id}: everything a board screen needs in one call.
pub async fn get_board(
    State(state): State<AppState>,
    Path(board_id): Path<Uuid>,
    Query(query): Query<LeadQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let mut view = load_view(&state, board_id, &claims).await?;
    if let Some(term) = query.search.as_deref() {
        view.leads.retain(|lead| name_matches(lead, term));
    }
    Ok(Json(view))
}

pub async fn update_board(
    State(state): State<AppState>,
    Path(board_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<UpdateBoardRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    state.owned_board(board_id, &claims).await?;

    let name = req
        .name
        .as_deref()
        .map(|name| required("name", Some(name)))
        .transpose()?;
    let description = optional_edit(req.description);

    let board = state
        .call(move |db| {
            db.update_board(
                board_id,
                name.as_deref(),
                description.as_ref().map(|d| d.as_deref()),
            )
        })
        .await?
        .ok_or_else(|| ApiError::not_found("board"))?;
    Ok(Json(board))
}

/// DELETE /boards/{board_id}: columns and leads go with it.
pub async fn delete_board(
    State(state): State<AppState>,
    Path(board_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    state.owned_board(board_id, &claims).await?;

    if !state.call(move |db| db.delete_board(board_id)).await? {
        return Err(ApiError::not_found("board"));
    }

    state.dispatcher.publish(BoardEvent::BoardDeleted { board_id });
    info!("Board {} deleted", board_id);
    Ok(StatusCode::NO_CONTENT)
}

/// GET /boards/{board_id}/webhook: the URL to configure on the messaging platform.
pub async fn webhook_info(
    State(state): State<AppState>,
    Path(board_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let board = state.owned_board(board_id, &claims).await?;
    let url = format!(
        "{}/api/webhook/{}",
        state.public_url.trim_end_matches('/'),
        board.webhook_token
    );
    Ok(Json(WebhookInfo {
        token: board.webhook_token,
        url,
    }))
}

/// GET /boards/{board_id}/events: realtime feed, starting with a snapshot.
pub async fn board_events(
    State(state): State<AppState>,
    Path(board_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, ApiError> {
    // Subscribe first so changes committed while the snapshot loads are not lost
    let events = state.dispatcher.subscribe();
    let snapshot = load_view(&state, board_id, &claims).await?;

    let user_id = claims.sub;
    Ok(ws.on_upgrade(move |socket| {
        connection::handle_connection(socket, snapshot, events, user_id)
    }))
}

async fn load_view(state: &AppState, board_id: Uuid, claims: &Claims) -> Result<BoardView, ApiError> {
    let board = state.owned_board(board_id, claims).await?;
    let (columns, leads) = state
        .call(move |db| Ok((db.list_columns(board_id)?, db.list_leads(board_id)?)))
        .await?;
    Ok(BoardView::new(board, columns, leads))
}
