use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use meetwalk_shared::errors::{AppError, AppResult};

use crate::models::{Like, Match, NewUser, UpdateProfile, User};
use crate::services::geo::Coordinates;
use crate::store::Repository;

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Upsert by email: an existing account is returned as stored and the
/// incoming fields are ignored. The flag tells whether a row was created.
pub fn create_or_get(repo: &mut dyn Repository, mut new_user: NewUser) -> AppResult<(User, bool)> {
    new_user.email = normalize_email(&new_user.email);

    if let Some(existing) = repo.find_user_by_email(&new_user.email)? {
        tracing::debug!(user_id = %existing.id, "user already registered");
        return Ok((existing, false));
    }

    match repo.insert_user_if_absent(&new_user)? {
        Some(user) => {
            tracing::info!(user_id = %user.id, "user created");
            Ok((user, true))
        }
        // A concurrent signup won the unique email.
        None => {
            let existing = repo
                .find_user_by_email(&new_user.email)?
                .ok_or_else(|| AppError::internal("user vanished after email conflict"))?;
            Ok((existing, false))
        }
    }
}

pub fn get_user(repo: &mut dyn Repository, id: Uuid) -> AppResult<User> {
    repo.find_user(id)?.ok_or_else(AppError::user_not_found)
}

pub fn update_profile(repo: &mut dyn Repository, id: Uuid, changes: &UpdateProfile) -> AppResult<User> {
    let nothing_to_change = changes.name.is_none()
        && changes.bio.is_none()
        && changes.age.is_none()
        && changes.gender.is_none()
        && changes.photos.is_none()
        && changes.max_distance.is_none()
        && changes.min_age.is_none()
        && changes.max_age.is_none();
    if nothing_to_change {
        return get_user(repo, id);
    }

    let current = get_user(repo, id)?;
    let min_age = changes.min_age.unwrap_or(current.min_age);
    let max_age = changes.max_age.unwrap_or(current.max_age);
    if min_age > max_age {
        return Err(AppError::bad_request("minAge cannot be greater than maxAge"));
    }

    repo.update_profile(id, changes)?.ok_or_else(AppError::user_not_found)
}

pub fn update_location(
    repo: &mut dyn Repository,
    id: Uuid,
    at: Coordinates,
    now: DateTime<Utc>,
) -> AppResult<User> {
    repo.update_location(id, at, now)?.ok_or_else(AppError::user_not_found)
}

/// Sets the premium flag and expiry. No payment verification happens here.
pub fn set_premium(
    repo: &mut dyn Repository,
    id: Uuid,
    is_premium: bool,
    expires_at: Option<DateTime<Utc>>,
) -> AppResult<User> {
    let user = repo
        .update_premium(id, is_premium, expires_at)?
        .ok_or_else(AppError::user_not_found)?;
    tracing::info!(user_id = %id, is_premium, "premium status changed");
    Ok(user)
}

/// Likes addressed to the user, newest first.
pub fn likes_received(repo: &mut dyn Repository, id: Uuid) -> AppResult<Vec<Like>> {
    get_user(repo, id)?;
    repo.likes_received(id)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchWithUser {
    #[serde(flatten)]
    pub r#match: Match,
    pub other_user: Option<User>,
}

/// The user's matches, newest first, each joined with the other participant.
pub fn matches_with_users(repo: &mut dyn Repository, id: Uuid) -> AppResult<Vec<MatchWithUser>> {
    get_user(repo, id)?;

    repo.matches_for_user(id)?
        .into_iter()
        .map(|m| -> AppResult<MatchWithUser> {
            let other_user = match m.counterpart(id) {
                Some(other) => repo.find_user(other)?,
                None => None,
            };
            Ok(MatchWithUser { r#match: m, other_user })
        })
        .collect()
}
