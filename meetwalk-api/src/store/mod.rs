//! Persistence contract for the matching and discovery core.
//!
//! Services only see [`Repository`]; every logical operation runs inside
//! [`transaction`], so its writes land together or not at all.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use meetwalk_shared::errors::{AppError, AppResult};

use crate::config::AppConfig;
use crate::models::{Like, Match, Message, NewLike, NewMatch, NewMessage, NewUser, UpdateProfile, User};
use crate::services::geo::{BoundingBox, Coordinates};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub trait Repository {
    // --- users ---
    fn find_user(&mut self, id: Uuid) -> AppResult<Option<User>>;
    fn find_user_by_email(&mut self, email: &str) -> AppResult<Option<User>>;
    fn insert_user(&mut self, new_user: &NewUser) -> AppResult<User>;
    /// Returns `None` when the email is already taken, including by a concurrent insert.
    fn insert_user_if_absent(&mut self, new_user: &NewUser) -> AppResult<Option<User>>;
    /// Row-locks the given users for the rest of the transaction, in id order,
    /// and returns the ones that exist.
    fn lock_users(&mut self, ids: &[Uuid]) -> AppResult<Vec<User>>;
    fn update_profile(&mut self, id: Uuid, changes: &UpdateProfile) -> AppResult<Option<User>>;
    fn update_location(&mut self, id: Uuid, at: Coordinates, now: DateTime<Utc>) -> AppResult<Option<User>>;
    fn update_premium(&mut self, id: Uuid, is_premium: bool, expires_at: Option<DateTime<Utc>>) -> AppResult<Option<User>>;
    fn reset_usage(&mut self, id: Uuid, now: DateTime<Utc>) -> AppResult<Option<User>>;
    fn add_usage(&mut self, id: Uuid, minutes: i32) -> AppResult<Option<User>>;
    /// Decrements the balance by one only if it is positive. Returns whether a credit was taken.
    fn debit_super_like(&mut self, id: Uuid) -> AppResult<bool>;
    fn credit_super_likes(&mut self, id: Uuid, amount: i32) -> AppResult<Option<User>>;
    /// Users with a stored location inside `bounds`, minus `exclude`.
    fn users_within(&mut self, bounds: &BoundingBox, exclude: &[Uuid]) -> AppResult<Vec<User>>;

    // --- likes ---
    /// Returns `None` when a like for the same `(from, to)` pair already exists.
    fn insert_like(&mut self, new_like: &NewLike) -> AppResult<Option<Like>>;
    fn find_like(&mut self, from_user_id: Uuid, to_user_id: Uuid) -> AppResult<Option<Like>>;
    fn liked_user_ids(&mut self, from_user_id: Uuid) -> AppResult<Vec<Uuid>>;
    fn likes_received(&mut self, to_user_id: Uuid) -> AppResult<Vec<Like>>;

    // --- matches ---
    /// Returns `None` when the unordered pair already has a match.
    fn insert_match(&mut self, new_match: &NewMatch) -> AppResult<Option<Match>>;
    fn find_match_between(&mut self, a: Uuid, b: Uuid) -> AppResult<Option<Match>>;
    fn find_match(&mut self, id: Uuid) -> AppResult<Option<Match>>;
    /// Newest first.
    fn matches_for_user(&mut self, user_id: Uuid) -> AppResult<Vec<Match>>;

    // --- messages ---
    fn insert_message(&mut self, new_message: &NewMessage) -> AppResult<Message>;
    /// Oldest first.
    fn messages_for_match(&mut self, match_id: Uuid) -> AppResult<Vec<Message>>;
    fn mark_messages_read(&mut self, match_id: Uuid, receiver_id: Uuid) -> AppResult<usize>;
    fn unread_count(&mut self, user_id: Uuid) -> AppResult<i64>;
}

pub trait Store: Send + Sync {
    /// Runs `f` in one transaction, committing only when it returns `Ok`.
    fn run_in_transaction(
        &self,
        f: &mut dyn FnMut(&mut dyn Repository) -> AppResult<()>,
    ) -> AppResult<()>;

    /// Cheap liveness check for the health endpoint.
    fn ping(&self) -> AppResult<()>;

    fn backend(&self) -> &'static str;
}

/// Typed wrapper over [`Store::run_in_transaction`].
pub fn transaction<T>(
    store: &dyn Store,
    mut f: impl FnMut(&mut dyn Repository) -> AppResult<T>,
) -> AppResult<T> {
    let mut output = None;
    store.run_in_transaction(&mut |repo| {
        output = Some(f(repo)?);
        Ok(())
    })?;
    output.ok_or_else(|| AppError::internal("transaction finished without a result"))
}

/// `memory://` selects the in-process store; anything else is a Postgres URL.
pub fn connect(config: &AppConfig) -> anyhow::Result<Arc<dyn Store>> {
    if config.database_url.starts_with("memory://") {
        tracing::warn!("using in-memory store, data will not survive a restart");
        return Ok(Arc::new(MemoryStore::new()));
    }

    let pool = meetwalk_shared::clients::db::create_pool(&config.database_url, config.db_pool_size)?;
    Ok(Arc::new(PgStore::new(pool)))
}
