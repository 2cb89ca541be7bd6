use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use uuid::Uuid;

use meetwalk_shared::clients::db::DbPool;
use meetwalk_shared::errors::{AppError, AppResult};

use crate::models::{Like, Match, Message, NewLike, NewMatch, NewMessage, NewUser, UpdateProfile, User};
use crate::schema::{likes, matches, messages, users};
use crate::services::geo::{BoundingBox, Coordinates};

use super::{Repository, Store};

pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl Store for PgStore {
    fn run_in_transaction(
        &self,
        f: &mut dyn FnMut(&mut dyn Repository) -> AppResult<()>,
    ) -> AppResult<()> {
        let mut pooled = self.pool.get().map_err(|e| AppError::Internal(e.into()))?;
        let conn: &mut PgConnection = &mut pooled;

        conn.transaction::<(), AppError, _>(|conn| {
            let mut repo = PgRepository { conn };
            f(&mut repo)
        })
    }

    fn ping(&self) -> AppResult<()> {
        let mut pooled = self.pool.get().map_err(|e| AppError::Internal(e.into()))?;
        let conn: &mut PgConnection = &mut pooled;
        diesel::sql_query("SELECT 1").execute(conn)?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}

pub struct PgRepository<'c> {
    conn: &'c mut PgConnection,
}

impl Repository for PgRepository<'_> {
    fn find_user(&mut self, id: Uuid) -> AppResult<Option<User>> {
        Ok(users::table.find(id).first::<User>(self.conn).optional()?)
    }

    fn find_user_by_email(&mut self, email: &str) -> AppResult<Option<User>> {
        Ok(users::table
            .filter(users::email.eq(email))
            .first::<User>(self.conn)
            .optional()?)
    }

    fn insert_user(&mut self, new_user: &NewUser) -> AppResult<User> {
        Ok(diesel::insert_into(users::table)
            .values(new_user)
            .get_result::<User>(self.conn)?)
    }

    fn insert_user_if_absent(&mut self, new_user: &NewUser) -> AppResult<Option<User>> {
        Ok(diesel::insert_into(users::table)
            .values(new_user)
            .on_conflict(users::email)
            .do_nothing()
            .get_result::<User>(self.conn)
            .optional()?)
    }

    fn lock_users(&mut self, ids: &[Uuid]) -> AppResult<Vec<User>> {
        let mut ids = ids.to_vec();
        ids.sort();
        ids.dedup();

        Ok(users::table
            .filter(users::id.eq_any(ids))
            .order(users::id)
            .for_update()
            .load::<User>(self.conn)?)
    }

    fn update_profile(&mut self, id: Uuid, changes: &UpdateProfile) -> AppResult<Option<User>> {
        Ok(diesel::update(users::table.find(id))
            .set(changes)
            .get_result::<User>(self.conn)
            .optional()?)
    }

    fn update_location(&mut self, id: Uuid, at: Coordinates, now: DateTime<Utc>) -> AppResult<Option<User>> {
        Ok(diesel::update(users::table.find(id))
            .set((
                users::latitude.eq(at.latitude),
                users::longitude.eq(at.longitude),
                users::last_active.eq(now),
            ))
            .get_result::<User>(self.conn)
            .optional()?)
    }

    fn update_premium(
        &mut self,
        id: Uuid,
        is_premium: bool,
        expires_at: Option<DateTime<Utc>>,
    ) -> AppResult<Option<User>> {
        Ok(diesel::update(users::table.find(id))
            .set((
                users::is_premium.eq(is_premium),
                users::premium_expires_at.eq(expires_at),
            ))
            .get_result::<User>(self.conn)
            .optional()?)
    }

    fn reset_usage(&mut self, id: Uuid, now: DateTime<Utc>) -> AppResult<Option<User>> {
        Ok(diesel::update(users::table.find(id))
            .set((
                users::daily_usage_minutes.eq(0),
                users::last_usage_reset.eq(now),
            ))
            .get_result::<User>(self.conn)
            .optional()?)
    }

    fn add_usage(&mut self, id: Uuid, minutes: i32) -> AppResult<Option<User>> {
        Ok(diesel::update(users::table.find(id))
            .set(users::daily_usage_minutes.eq(users::daily_usage_minutes + minutes))
            .get_result::<User>(self.conn)
            .optional()?)
    }

    fn debit_super_like(&mut self, id: Uuid) -> AppResult<bool> {
        let updated = diesel::update(
            users::table
                .filter(users::id.eq(id))
                .filter(users::super_like_balance.gt(0)),
        )
        .set(users::super_like_balance.eq(users::super_like_balance - 1))
        .execute(self.conn)?;

        Ok(updated == 1)
    }

    fn credit_super_likes(&mut self, id: Uuid, amount: i32) -> AppResult<Option<User>> {
        Ok(diesel::update(users::table.find(id))
            .set(users::super_like_balance.eq(users::super_like_balance + amount))
            .get_result::<User>(self.conn)
            .optional()?)
    }

    fn users_within(&mut self, bounds: &BoundingBox, exclude: &[Uuid]) -> AppResult<Vec<User>> {
        Ok(users::table
            .filter(users::latitude.between(bounds.min_lat, bounds.max_lat))
            .filter(users::longitude.between(bounds.min_lon, bounds.max_lon))
            .filter(users::id.ne_all(exclude.to_vec()))
            .load::<User>(self.conn)?)
    }

    fn insert_like(&mut self, new_like: &NewLike) -> AppResult<Option<Like>> {
        Ok(diesel::insert_into(likes::table)
            .values(new_like)
            .on_conflict((likes::from_user_id, likes::to_user_id))
            .do_nothing()
            .get_result::<Like>(self.conn)
            .optional()?)
    }

    fn find_like(&mut self, from_user_id: Uuid, to_user_id: Uuid) -> AppResult<Option<Like>> {
        Ok(likes::table
            .filter(likes::from_user_id.eq(from_user_id))
            .filter(likes::to_user_id.eq(to_user_id))
            .first::<Like>(self.conn)
            .optional()?)
    }

    fn liked_user_ids(&mut self, from_user_id: Uuid) -> AppResult<Vec<Uuid>> {
        Ok(likes::table
            .filter(likes::from_user_id.eq(from_user_id))
            .select(likes::to_user_id)
            .load::<Uuid>(self.conn)?)
    }

    fn likes_received(&mut self, to_user_id: Uuid) -> AppResult<Vec<Like>> {
        Ok(likes::table
            .filter(likes::to_user_id.eq(to_user_id))
            .order(likes::created_at.desc())
            .load::<Like>(self.conn)?)
    }

    fn insert_match(&mut self, new_match: &NewMatch) -> AppResult<Option<Match>> {
        // The pair index is on LEAST/GREATEST, so no explicit conflict target.
        Ok(diesel::insert_into(matches::table)
            .values(new_match)
            .on_conflict_do_nothing()
            .get_result::<Match>(self.conn)
            .optional()?)
    }

    fn find_match_between(&mut self, a: Uuid, b: Uuid) -> AppResult<Option<Match>> {
        Ok(matches::table
            .filter(
                matches::user1_id.eq(a).and(matches::user2_id.eq(b))
                    .or(matches::user1_id.eq(b).and(matches::user2_id.eq(a))),
            )
            .first::<Match>(self.conn)
            .optional()?)
    }

    fn find_match(&mut self, id: Uuid) -> AppResult<Option<Match>> {
        Ok(matches::table.find(id).first::<Match>(self.conn).optional()?)
    }

    fn matches_for_user(&mut self, user_id: Uuid) -> AppResult<Vec<Match>> {
        Ok(matches::table
            .filter(matches::user1_id.eq(user_id).or(matches::user2_id.eq(user_id)))
            .order(matches::created_at.desc())
            .load::<Match>(self.conn)?)
    }

    fn insert_message(&mut self, new_message: &NewMessage) -> AppResult<Message> {
        Ok(diesel::insert_into(messages::table)
            .values(new_message)
            .get_result::<Message>(self.conn)?)
    }

    fn messages_for_match(&mut self, match_id: Uuid) -> AppResult<Vec<Message>> {
        Ok(messages::table
            .filter(messages::match_id.eq(match_id))
            .order(messages::created_at.asc())
            .load::<Message>(self.conn)?)
    }

    fn mark_messages_read(&mut self, match_id: Uuid, receiver_id: Uuid) -> AppResult<usize> {
        Ok(diesel::update(
            messages::table
                .filter(messages::match_id.eq(match_id))
                .filter(messages::receiver_id.eq(receiver_id))
                .filter(messages::is_read.eq(false)),
        )
        .set(messages::is_read.eq(true))
        .execute(self.conn)?)
    }

    fn unread_count(&mut self, user_id: Uuid) -> AppResult<i64> {
        Ok(messages::table
            .filter(messages::receiver_id.eq(user_id))
            .filter(messages::is_read.eq(false))
            .count()
            .get_result::<i64>(self.conn)?)
    }
}

// Needs a migrated database: `DATABASE_URL=... cargo test -- --ignored`.
#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::matching::record_like;
    use crate::store::transaction;
    use std::sync::{Arc, Barrier};
    use std::thread;

    fn store() -> Option<Arc<PgStore>> {
        let url = std::env::var("DATABASE_URL").ok()?;
        let pool = meetwalk_shared::clients::db::create_pool(&url, 8).unwrap();
        Some(Arc::new(PgStore::new(pool)))
    }

    fn seed(store: &PgStore) -> User {
        transaction(store, |repo| {
            repo.insert_user(&NewUser {
                name: "concurrent".into(),
                email: format!("{}@example.com", Uuid::new_v4()),
                ..Default::default()
            })
        })
        .unwrap()
    }

    fn race<T: Send + 'static>(jobs: Vec<Box<dyn FnOnce() -> T + Send>>) -> Vec<T> {
        let barrier = Arc::new(Barrier::new(jobs.len()));
        let handles: Vec<_> = jobs
            .into_iter()
            .map(|job| {
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    job()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    }

    #[test]
    #[ignore]
    fn reciprocal_likes_under_contention_always_match() {
        let Some(store) = store() else { return };

        for _ in 0..30 {
            let (a, b) = (seed(&store), seed(&store));
            let jobs: Vec<Box<dyn FnOnce() -> bool + Send>> = [(a.id, b.id), (b.id, a.id)]
                .into_iter()
                .map(|(from, to)| {
                    let store = Arc::clone(&store);
                    Box::new(move || {
                        transaction(&*store, |repo| record_like(repo, from, to, false))
                            .unwrap()
                            .is_match
                    }) as Box<dyn FnOnce() -> bool + Send>
                })
                .collect();

            let created = race(jobs).into_iter().filter(|m| *m).count();
            assert_eq!(created, 1);
            assert!(transaction(&*store, |repo| repo.find_match_between(a.id, b.id)).unwrap().is_some());
        }
    }

    #[test]
    #[ignore]
    fn identical_super_likes_charge_once() {
        let Some(store) = store() else { return };

        for _ in 0..10 {
            let (a, b) = (seed(&store), seed(&store));
            transaction(&*store, |repo| repo.credit_super_likes(a.id, 5)).unwrap();

            let jobs: Vec<Box<dyn FnOnce() -> Uuid + Send>> = (0..4)
                .map(|_| {
                    let store = Arc::clone(&store);
                    let (from, to) = (a.id, b.id);
                    Box::new(move || {
                        transaction(&*store, |repo| record_like(repo, from, to, true))
                            .unwrap()
                            .like
                            .id
                    }) as Box<dyn FnOnce() -> Uuid + Send>
                })
                .collect();

            let mut ids = race(jobs);
            ids.dedup();
            assert_eq!(ids.len(), 1);

            let after = transaction(&*store, |repo| repo.find_user(a.id)).unwrap().unwrap();
            assert_eq!(after.super_like_balance, 4);
        }
    }

    #[test]
    #[ignore]
    fn concurrent_signups_with_one_email_return_one_user() {
        let Some(store) = store() else { return };
        let email = format!("{}@example.com", Uuid::new_v4());

        let jobs: Vec<Box<dyn FnOnce() -> Uuid + Send>> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                let email = email.clone();
                Box::new(move || {
                    let new_user = NewUser { name: "same".into(), email, ..Default::default() };
                    transaction(&*store, |repo| crate::services::users::create_or_get(repo, new_user.clone()))
                        .unwrap()
                        .0
                        .id
                }) as Box<dyn FnOnce() -> Uuid + Send>
            })
            .collect();

        let mut ids = race(jobs);
        ids.dedup();
        assert_eq!(ids.len(), 1);
    }
}
