use std::sync::Arc;

use tracing::error;
use uuid::Uuid;

use leadboard_db::Database;
use leadboard_gateway::dispatcher::Dispatcher;
use leadboard_types::api::Claims;
use leadboard_types::models::{Board, Column, Lead};

use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub dispatcher: Dispatcher,
    pub jwt_secret: String,
    /// Base URL the service is reachable at, used to build webhook URLs.
    pub public_url: String,
}

impl AppStateInner {
    /// Run a blocking database call off the async runtime.
    pub async fn call<F, T>(self: &Arc<Self>, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let state = self.clone();
        tokio::task::spawn_blocking(move || f(&state.db))
            .await
            .map_err(|e| {
                error!("spawn_blocking join error: {}", e);
                ApiError::Internal("internal server error".into())
            })?
            .map_err(ApiError::from)
    }

    /// The board, if it exists and belongs to the caller's organization.
    /// Boards of other organizations are reported as missing.
    pub async fn owned_board(self: &Arc<Self>, board_id: Uuid, claims: &Claims) -> Result<Board, ApiError> {
        let org = claims.org;
        self.call(move |db| db.get_board(board_id))
            .await?
            .filter(|board| board.organization_id == org)
            .ok_or_else(|| ApiError::not_found("board"))
    }

    pub async fn owned_column(self: &Arc<Self>, column_id: Uuid, claims: &Claims) -> Result<Column, ApiError> {
        let org = claims.org;
        self.call(move |db| {
            let Some(column) = db.get_column(column_id)? else {
                return Ok(None);
            };
            let owned = db
                .get_board(column.board_id)?
                .is_some_and(|board| board.organization_id == org);
            Ok(owned.then_some(column))
        })
        .await?
        .ok_or_else(|| ApiError::not_found("column"))
    }

    pub async fn owned_lead(self: &Arc<Self>, lead_id: Uuid, claims: &Claims) -> Result<Lead, ApiError> {
        let org = claims.org;
        self.call(move |db| {
            let Some(lead) = db.get_lead(lead_id)? else {
                return Ok(None);
            };
            let owned = db
                .get_board(lead.board_id)?
                .is_some_and(|board| board.organization_id == org);
            Ok(owned.then_some(lead))
        })
        .await?
        .ok_or_else(|| ApiError::not_found("lead"))
    }
}
