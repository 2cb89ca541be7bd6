use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use meetwalk_shared::errors::AppResult;
use meetwalk_shared::middleware::ValidatedJson;

use crate::services::matching::{self, LikeOutcome};
use crate::store::transaction;
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LikeRequest {
    pub from_user_id: Uuid,
    pub to_user_id: Uuid,
    #[serde(default)]
    pub is_super_like: bool,
}

// --- POST /api/likes ---

pub async fn send_like(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<LikeRequest>,
) -> AppResult<Json<LikeOutcome>> {
    let outcome = transaction(state.store.as_ref(), |repo| {
        matching::record_like(repo, req.from_user_id, req.to_user_id, req.is_super_like)
    })
    .map_err(|e| e.or_fail("Failed to create like"))?;

    Ok(Json(outcome))
}
