use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use meetwalk_shared::errors::AppResult;
use meetwalk_shared::middleware::ValidatedJson;
use meetwalk_shared::types::{CountResponse, SuccessResponse};

use crate::models::Message;
use crate::services::messaging::{self, OutgoingMessage};
use crate::store::transaction;
use crate::AppState;

// --- Request DTOs ---

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub match_id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    #[validate(length(max = 2000))]
    pub content: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MarkReadRequest {
    pub receiver_id: Uuid,
}

// --- POST /api/messages ---

pub async fn send_message(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<SendMessageRequest>,
) -> AppResult<Json<Message>> {
    let policy = state.config.messaging_policy();
    let outgoing = OutgoingMessage {
        match_id: req.match_id,
        sender_id: req.sender_id,
        receiver_id: req.receiver_id,
        content: req.content,
    };

    let message = transaction(state.store.as_ref(), |repo| {
        messaging::send_message(repo, outgoing.clone(), &policy, Utc::now())
    })
    .map_err(|e| e.or_fail("Failed to send message"))?;

    Ok(Json(message))
}

// --- GET /api/matches/:matchId/messages ---

pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    Path(match_id): Path<Uuid>,
) -> AppResult<Json<Vec<Message>>> {
    let messages = transaction(state.store.as_ref(), |repo| messaging::list_messages(repo, match_id))
        .map_err(|e| e.or_fail("Failed to get messages"))?;
    Ok(Json(messages))
}

// --- POST /api/matches/:matchId/read ---

pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    Path(match_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<MarkReadRequest>,
) -> AppResult<Json<SuccessResponse>> {
    transaction(state.store.as_ref(), |repo| messaging::mark_read(repo, match_id, req.receiver_id))
        .map_err(|e| e.or_fail("Failed to mark messages as read"))?;
    Ok(Json(SuccessResponse::ok()))
}

// --- GET /api/users/:id/unread-count ---

pub async fn unread_count(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<CountResponse>> {
    let count = transaction(state.store.as_ref(), |repo| messaging::unread_count(repo, user_id))
        .map_err(|e| e.or_fail("Failed to get unread count"))?;
    Ok(Json(CountResponse { count }))
}
