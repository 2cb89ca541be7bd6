use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use meetwalk_shared::errors::AppResult;

use crate::models::User;
use crate::services::{geo, quota, users};
use crate::store::transaction;
use crate::AppState;

// --- GET /api/users/:id/nearby ---

/// Runs the daily quota gate, then returns users within the configured radius.
pub async fn nearby(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<User>>> {
    let policy = state.config.quota_policy();
    let radius_km = state.config.nearby_radius_km;

    // The reset is committed even when the gate then denies access.
    let (decision, user) = transaction(state.store.as_ref(), |repo| {
        let user = users::get_user(repo, id)?;
        quota::check_quota(repo, user, &policy, Utc::now())
    })
    .map_err(|e| e.or_fail("Failed to check usage"))?;

    decision.into_result()?;

    let nearby = transaction(state.store.as_ref(), |repo| geo::nearby_candidates(repo, &user, radius_km))
        .map_err(|e| e.or_fail("Failed to get nearby users"))?;

    Ok(Json(nearby))
}
