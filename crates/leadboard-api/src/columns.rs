use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use leadboard_types::api::{Claims, CreateColumnRequest, UpdateColumnRequest};
use leadboard_types::events::BoardEvent;
use leadboard_types::models::default_status;

use crate::error::{ApiError, required};
use crate::state::AppState;

pub async fn list_columns(
    State(state): State<AppState>,
    Path(board_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    state.owned_board(board_id, &claims).await?;
    let columns = state.call(move |db| db.list_columns(board_id)).await?;
    Ok(Json(columns))
}

/// POST /boards/{board_id}/columns: appended to the right of the board.
pub async fn create_column(
    State(state): State<AppState>,
    Path(board_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<CreateColumnRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let title = required("title", Some(req.title.as_str()))?;
    let status = req
        .status
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default_status(&title));

    state.owned_board(board_id, &claims).await?;
    let column = state
        .call(move |db| db.create_column(board_id, &title, &status))
        .await?;

    state.dispatcher.publish(BoardEvent::ColumnCreated(column.clone()));
    Ok((StatusCode::CREATED, Json(column)))
}

pub async fn update_column(
    State(state): State<AppState>,
    Path(column_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<UpdateColumnRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let title = req
        .title
        .as_deref()
        .map(|t| required("title", Some(t)))
        .transpose()?;
    let status = req
        .status
        .as_deref()
        .map(|s| required("status", Some(s)))
        .transpose()?;

    state.owned_column(column_id, &claims).await?;
    let column = state
        .call(move |db| db.update_column(column_id, title.as_deref(), status.as_deref()))
        .await?
        .ok_or_else(|| ApiError::not_found("column"))?;

    state.dispatcher.publish(BoardEvent::ColumnUpdated(column.clone()));
    Ok(Json(column))
}

/// DELETE /columns/{column_id}: the column's leads are deleted with it.
pub async fn delete_column(
    State(state): State<AppState>,
    Path(column_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let column = state.owned_column(column_id, &claims).await?;

    if !state.call(move |db| db.delete_column(column_id)).await? {
        return Err(ApiError::not_found("column"));
    }

    state.dispatcher.publish(BoardEvent::ColumnDeleted {
        board_id: column.board_id,
        id: column_id,
    });
    Ok(StatusCode::NO_CONTENT)
}
