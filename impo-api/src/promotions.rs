use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use impo_promo::{BoardColumns, NewPromotion, Promotion, PromotionStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct MoveRequest {
    pub column: PromotionStatus,
    pub index: usize,
}

#[derive(Debug, Serialize)]
pub struct BoardUpdate {
    pub changed: Vec<Promotion>,
    pub board: BoardColumns,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/promotions", get(get_board).post(create_promotion))
        .route("/v1/promotions/{id}", delete(delete_promotion))
        .route("/v1/promotions/{id}/move", post(move_promotion))
        .route("/v1/promotions/deactivate-expired", post(deactivate_expired))
}

pub async fn get_board(State(state): State<AppState>) -> Json<BoardColumns> {
    Json(state.promotions.columns().await)
}

pub async fn create_promotion(
    State(state): State<AppState>,
    Json(new): Json<NewPromotion>,
) -> Result<(StatusCode, Json<Promotion>), AppError> {
    let promotion = state.promotions.add(new).await?;
    Ok((StatusCode::CREATED, Json(promotion)))
}

/// Drop a card into a column at a position.
pub async fn move_promotion(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<MoveRequest>,
) -> Result<Json<BoardUpdate>, AppError> {
    let changed = state.promotions.move_to(id, body.column, body.index).await?;
    let board = state.promotions.columns().await;
    Ok(Json(BoardUpdate { changed, board }))
}

pub async fn delete_promotion(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<StatusCode, AppError> {
    state.promotions.remove(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn deactivate_expired(State(state): State<AppState>) -> Result<Json<BoardUpdate>, AppError> {
    let changed = state.promotions.deactivate_expired().await?;
    let board = state.promotions.columns().await;
    Ok(Json(BoardUpdate { changed, board }))
}
