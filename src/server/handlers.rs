use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::error;

use crate::engine::{commands, BotState, GameError, OperatorCommand};
use crate::models::{HistoryEntry, ItemUseNotice, RoundSnapshot};
use crate::storage::{persist_dirty, JsonStore};
use crate::workers::Outbox;

/// How many settled rounds the history endpoint returns
const HISTORY_DISPLAY_LIMIT: usize = 10;

/// Shared handler state: the same lock the workers mutate through
#[derive(Clone)]
pub struct ServerContext {
    pub state: Arc<RwLock<BotState>>,
    pub store: Arc<JsonStore>,
    pub outbox: Outbox,
}

/// Engine rejection carried out as an HTTP response
pub struct ApiError(GameError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            GameError::Validation(_) => StatusCode::BAD_REQUEST,
            GameError::ItemNotFound(_)
            | GameError::NotOwned(_)
            | GameError::UserNotFound(_)
            | GameError::NoActiveRound => StatusCode::NOT_FOUND,
            _ => StatusCode::CONFLICT,
        };

        (status, Json(json!({ "ok": false, "error": self.0.to_string() }))).into_response()
    }
}

impl From<GameError> for ApiError {
    fn from(err: GameError) -> Self {
        ApiError(err)
    }
}

pub async fn dashboard() -> Html<&'static str> {
    Html(include_str!("../../assets/dashboard.html"))
}

pub async fn overlay() -> Html<&'static str> {
    Html(include_str!("../../assets/overlay.html"))
}

/// Current-round snapshot for the overlay; `{active: false}` when idle
pub async fn current_betting(State(ctx): State<ServerContext>) -> Json<RoundSnapshot> {
    let state = ctx.state.read().await;
    Json(state.betting.snapshot(Utc::now()))
}

/// The last settled rounds, oldest first
pub async fn betting_history(State(ctx): State<ServerContext>) -> Json<Vec<HistoryEntry>> {
    let state = ctx.state.read().await;
    Json(state.betting.recent_history(HISTORY_DISPLAY_LIMIT))
}

/// Item-use notices that have not expired yet
pub async fn items_used(State(ctx): State<ServerContext>) -> Json<Vec<ItemUseNotice>> {
    let state = ctx.state.read().await;
    Json(state.shop.active_notices(Utc::now()))
}

#[derive(Debug, Deserialize)]
pub struct StartBettingRequest {
    pub topic: String,
    pub options: Vec<String>,
    pub duration_minutes: i64,
}

pub async fn start_betting(
    State(ctx): State<ServerContext>,
    Json(req): Json<StartBettingRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    dispatch(
        &ctx,
        OperatorCommand::StartRound {
            topic: req.topic,
            options: req.options,
            duration_minutes: req.duration_minutes,
        },
    )
    .await
}

pub async fn close_betting(
    State(ctx): State<ServerContext>,
) -> Result<Json<serde_json::Value>, ApiError> {
    dispatch(&ctx, OperatorCommand::CloseRound).await
}

#[derive(Debug, Deserialize)]
pub struct SettleBettingRequest {
    /// One-based option index, as shown in chat and on the overlay
    pub winning_option: usize,
}

pub async fn settle_betting(
    State(ctx): State<ServerContext>,
    Json(req): Json<SettleBettingRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    dispatch(
        &ctx,
        OperatorCommand::SettleRound {
            winning_option: req.winning_option,
        },
    )
    .await
}

#[derive(Debug, Deserialize)]
pub struct ItemRequest {
    pub name: String,
    pub price: i64,
    #[serde(default)]
    pub description: String,
}

pub async fn add_item(
    State(ctx): State<ServerContext>,
    Json(req): Json<ItemRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    dispatch(
        &ctx,
        OperatorCommand::AddItem {
            name: req.name,
            price: req.price,
            description: req.description,
        },
    )
    .await
}

pub async fn update_item(
    State(ctx): State<ServerContext>,
    Path(id): Path<String>,
    Json(req): Json<ItemRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    dispatch(
        &ctx,
        OperatorCommand::UpdateItem {
            id,
            name: req.name,
            price: req.price,
            description: req.description,
        },
    )
    .await
}

pub async fn delete_item(
    State(ctx): State<ServerContext>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    dispatch(&ctx, OperatorCommand::DeleteItem { id }).await
}

#[derive(Debug, Deserialize)]
pub struct EventRequest {
    pub multiplier: f64,
}

pub async fn set_multiplier(
    State(ctx): State<ServerContext>,
    Json(req): Json<EventRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    dispatch(
        &ctx,
        OperatorCommand::SetMultiplier {
            multiplier: req.multiplier,
        },
    )
    .await
}

#[derive(Debug, Deserialize)]
pub struct PointsRequest {
    pub points: i64,
}

pub async fn set_points(
    State(ctx): State<ServerContext>,
    Path(user): Path<String>,
    Json(req): Json<PointsRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    dispatch(
        &ctx,
        OperatorCommand::SetPoints {
            user,
            points: req.points,
        },
    )
    .await
}

pub async fn delete_user(
    State(ctx): State<ServerContext>,
    Path(user): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    dispatch(&ctx, OperatorCommand::DeleteUser { user }).await
}

pub async fn reset_points(
    State(ctx): State<ServerContext>,
) -> Result<Json<serde_json::Value>, ApiError> {
    dispatch(&ctx, OperatorCommand::ResetPoints).await
}

/// Run one operator command: mutate under the write lock, queue the chat
/// announcements, persist the touched documents after the lock drops.
async fn dispatch(
    ctx: &ServerContext,
    command: OperatorCommand,
) -> Result<Json<serde_json::Value>, ApiError> {
    let now = Utc::now();

    let dirty = {
        let mut state = ctx.state.write().await;
        let (replies, dirty) = commands::dispatch_operator(&mut state, command, now)?;

        for reply in replies {
            let _ = ctx.outbox.send(reply);
        }
        dirty
    };

    if dirty.any() {
        let state = ctx.state.read().await;
        if let Err(e) = persist_dirty(&ctx.store, &state, dirty) {
            error!("Persistence failed (state kept in memory): {e}");
        }
    }

    Ok(Json(json!({ "ok": true })))
}
