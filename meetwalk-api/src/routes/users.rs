use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use meetwalk_shared::errors::{AppError, AppResult};
use meetwalk_shared::middleware::ValidatedJson;

use crate::models::{Like, NewUser, UpdateProfile, User};
use crate::services::geo::Coordinates;
use crate::services::users::{self, MatchWithUser};
use crate::services::{ledger, quota};
use crate::store::transaction;
use crate::AppState;

fn checked_coordinates(latitude: f64, longitude: f64) -> AppResult<Coordinates> {
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return Err(AppError::Validation(format!(
            "coordinates out of range: latitude {latitude}, longitude {longitude}"
        )));
    }
    Ok(Coordinates::new(latitude, longitude))
}

// --- POST /api/users ---

fn trimmed<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(String::deserialize(deserializer)?.trim().to_string())
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(email)]
    #[serde(deserialize_with = "trimmed")]
    pub email: String,
    #[validate(length(max = 500))]
    pub bio: Option<String>,
    #[validate(range(min = 18, max = 120))]
    pub age: Option<i32>,
    #[validate(length(max = 32))]
    pub gender: Option<String>,
    #[validate(length(max = 9))]
    pub photos: Option<Vec<String>>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl CreateUserRequest {
    fn into_new_user(self) -> AppResult<NewUser> {
        let location = match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(checked_coordinates(latitude, longitude)?),
            (None, None) => None,
            _ => {
                return Err(AppError::Validation(
                    "latitude and longitude must be provided together".into(),
                ))
            }
        };

        Ok(NewUser {
            name: self.name,
            email: self.email,
            bio: self.bio,
            age: self.age,
            gender: self.gender,
            photos: self.photos,
            latitude: location.map(|c| c.latitude),
            longitude: location.map(|c| c.longitude),
            ..Default::default()
        })
    }
}

/// Creates the user, or returns the stored one unchanged when the email is taken.
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<User>)> {
    let new_user = req.into_new_user()?;

    let (user, created) = transaction(state.store.as_ref(), |repo| users::create_or_get(repo, new_user.clone()))
        .map_err(|e| e.or_fail("Failed to create user"))?;

    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(user)))
}

// --- GET /api/users/:id ---

pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<User>> {
    let user = transaction(state.store.as_ref(), |repo| users::get_user(repo, id))
        .map_err(|e| e.or_fail("Failed to fetch user"))?;
    Ok(Json(user))
}

// --- PATCH /api/users/:id ---

pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    ValidatedJson(changes): ValidatedJson<UpdateProfile>,
) -> AppResult<Json<User>> {
    let user = transaction(state.store.as_ref(), |repo| users::update_profile(repo, id, &changes))
        .map_err(|e| e.or_fail("Failed to update user"))?;
    Ok(Json(user))
}

// --- POST /api/users/:id/location ---

#[derive(Debug, Deserialize, Validate)]
pub struct LocationRequest {
    pub latitude: f64,
    pub longitude: f64,
}

pub async fn update_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<LocationRequest>,
) -> AppResult<Json<User>> {
    let at = checked_coordinates(req.latitude, req.longitude)?;
    let user = transaction(state.store.as_ref(), |repo| users::update_location(repo, id, at, Utc::now()))
        .map_err(|e| e.or_fail("Failed to update location"))?;
    Ok(Json(user))
}

// --- POST /api/users/:id/premium ---

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PremiumRequest {
    pub is_premium: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

pub async fn set_premium(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<PremiumRequest>,
) -> AppResult<Json<User>> {
    let user = transaction(state.store.as_ref(), |repo| {
        users::set_premium(repo, id, req.is_premium, req.expires_at)
    })
    .map_err(|e| e.or_fail("Failed to update premium status"))?;
    Ok(Json(user))
}

// --- POST /api/users/:id/super-likes ---

#[derive(Debug, Deserialize, Validate)]
pub struct SuperLikeCreditRequest {
    #[validate(range(min = 1, max = 1000))]
    pub amount: i32,
}

pub async fn credit_super_likes(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<SuperLikeCreditRequest>,
) -> AppResult<Json<User>> {
    let user = transaction(state.store.as_ref(), |repo| ledger::credit(repo, id, req.amount))
        .map_err(|e| e.or_fail("Failed to purchase super likes"))?;
    Ok(Json(user))
}

// --- POST /api/users/:id/usage ---

#[derive(Debug, Deserialize, Validate)]
pub struct UsageRequest {
    #[validate(range(min = 1, max = 1440))]
    pub minutes: i32,
}

pub async fn record_usage(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UsageRequest>,
) -> AppResult<Json<User>> {
    let user = transaction(state.store.as_ref(), |repo| {
        let user = users::get_user(repo, id)?;
        quota::record_usage(repo, user, req.minutes, Utc::now())
    })
    .map_err(|e| e.or_fail("Failed to record usage"))?;
    Ok(Json(user))
}

// --- GET /api/users/:id/likes-received ---

pub async fn likes_received(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<Like>>> {
    let likes = transaction(state.store.as_ref(), |repo| users::likes_received(repo, id))
        .map_err(|e| e.or_fail("Failed to fetch likes"))?;
    Ok(Json(likes))
}

// --- GET /api/users/:id/matches ---

pub async fn list_matches(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<MatchWithUser>>> {
    let matches = transaction(state.store.as_ref(), |repo| users::matches_with_users(repo, id))
        .map_err(|e| e.or_fail("Failed to fetch matches"))?;
    Ok(Json(matches))
}
