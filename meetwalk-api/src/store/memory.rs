use chrono::{DateTime, Utc};
use std::sync::Mutex;
use uuid::Uuid;

use meetwalk_shared::errors::{AppError, AppResult};

use crate::models::{Like, Match, Message, NewLike, NewMatch, NewMessage, NewUser, UpdateProfile, User};
use crate::services::geo::{BoundingBox, Coordinates};

use super::{Repository, Store};

/// Process-local store. A transaction works on a copy of the state and swaps
/// it in on success, so failed operations leave nothing behind.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    users: Vec<User>,
    likes: Vec<Like>,
    matches: Vec<Match>,
    messages: Vec<Message>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn run_in_transaction(
        &self,
        f: &mut dyn FnMut(&mut dyn Repository) -> AppResult<()>,
    ) -> AppResult<()> {
        let mut guard = self
            .state
            .lock()
            .map_err(|_| AppError::internal("memory store lock poisoned"))?;

        let mut working = guard.clone();
        f(&mut MemoryRepository { state: &mut working })?;
        *guard = working;
        Ok(())
    }

    fn ping(&self) -> AppResult<()> {
        self.state
            .lock()
            .map(|_| ())
            .map_err(|_| AppError::internal("memory store lock poisoned"))
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

struct MemoryRepository<'s> {
    state: &'s mut MemoryState,
}

impl MemoryRepository<'_> {
    fn user_mut(&mut self, id: Uuid) -> Option<&mut User> {
        self.state.users.iter_mut().find(|u| u.id == id)
    }
}

impl Repository for MemoryRepository<'_> {
    fn find_user(&mut self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.state.users.iter().find(|u| u.id == id).cloned())
    }

    fn find_user_by_email(&mut self, email: &str) -> AppResult<Option<User>> {
        Ok(self.state.users.iter().find(|u| u.email == email).cloned())
    }

    fn insert_user(&mut self, new_user: &NewUser) -> AppResult<User> {
        if self.state.users.iter().any(|u| u.email == new_user.email) {
            return Err(AppError::Database(diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::UniqueViolation,
                Box::new(String::from("users_email_key")),
            )));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: new_user.name.clone(),
            email: new_user.email.clone(),
            bio: new_user.bio.clone(),
            age: new_user.age,
            gender: new_user.gender.clone(),
            photos: new_user.photos.clone().unwrap_or_default(),
            latitude: new_user.latitude,
            longitude: new_user.longitude,
            is_premium: false,
            premium_expires_at: None,
            max_distance: new_user.max_distance.unwrap_or(3),
            min_age: new_user.min_age.unwrap_or(18),
            max_age: new_user.max_age.unwrap_or(50),
            created_at: now,
            last_active: now,
            daily_usage_minutes: 0,
            last_usage_reset: now,
            super_like_balance: 0,
        };
        self.state.users.push(user.clone());
        Ok(user)
    }

    fn insert_user_if_absent(&mut self, new_user: &NewUser) -> AppResult<Option<User>> {
        if self.state.users.iter().any(|u| u.email == new_user.email) {
            return Ok(None);
        }
        self.insert_user(new_user).map(Some)
    }

    // The store mutex already serializes transactions.
    fn lock_users(&mut self, ids: &[Uuid]) -> AppResult<Vec<User>> {
        let mut locked: Vec<User> = self
            .state
            .users
            .iter()
            .filter(|u| ids.contains(&u.id))
            .cloned()
            .collect();
        locked.sort_by_key(|u| u.id);
        Ok(locked)
    }

    fn update_profile(&mut self, id: Uuid, changes: &UpdateProfile) -> AppResult<Option<User>> {
        let Some(user) = self.user_mut(id) else {
            return Ok(None);
        };

        if let Some(name) = &changes.name {
            user.name = name.clone();
        }
        if let Some(bio) = &changes.bio {
            user.bio = Some(bio.clone());
        }
        if let Some(age) = changes.age {
            user.age = Some(age);
        }
        if let Some(gender) = &changes.gender {
            user.gender = Some(gender.clone());
        }
        if let Some(photos) = &changes.photos {
            user.photos = photos.clone();
        }
        if let Some(max_distance) = changes.max_distance {
            user.max_distance = max_distance;
        }
        if let Some(min_age) = changes.min_age {
            user.min_age = min_age;
        }
        if let Some(max_age) = changes.max_age {
            user.max_age = max_age;
        }
        Ok(Some(user.clone()))
    }

    fn update_location(&mut self, id: Uuid, at: Coordinates, now: DateTime<Utc>) -> AppResult<Option<User>> {
        Ok(self.user_mut(id).map(|user| {
            user.latitude = Some(at.latitude);
            user.longitude = Some(at.longitude);
            user.last_active = now;
            user.clone()
        }))
    }

    fn update_premium(
        &mut self,
        id: Uuid,
        is_premium: bool,
        expires_at: Option<DateTime<Utc>>,
    ) -> AppResult<Option<User>> {
        Ok(self.user_mut(id).map(|user| {
            user.is_premium = is_premium;
            user.premium_expires_at = expires_at;
            user.clone()
        }))
    }

    fn reset_usage(&mut self, id: Uuid, now: DateTime<Utc>) -> AppResult<Option<User>> {
        Ok(self.user_mut(id).map(|user| {
            user.daily_usage_minutes = 0;
            user.last_usage_reset = now;
            user.clone()
        }))
    }

    fn add_usage(&mut self, id: Uuid, minutes: i32) -> AppResult<Option<User>> {
        Ok(self.user_mut(id).map(|user| {
            user.daily_usage_minutes += minutes;
            user.clone()
        }))
    }

    fn debit_super_like(&mut self, id: Uuid) -> AppResult<bool> {
        match self.user_mut(id) {
            Some(user) if user.super_like_balance > 0 => {
                user.super_like_balance -= 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn credit_super_likes(&mut self, id: Uuid, amount: i32) -> AppResult<Option<User>> {
        Ok(self.user_mut(id).map(|user| {
            user.super_like_balance += amount;
            user.clone()
        }))
    }

    fn users_within(&mut self, bounds: &BoundingBox, exclude: &[Uuid]) -> AppResult<Vec<User>> {
        Ok(self
            .state
            .users
            .iter()
            .filter(|u| !exclude.contains(&u.id))
            .filter(|u| u.coordinates().is_some_and(|c| bounds.contains(c)))
            .cloned()
            .collect())
    }

    fn insert_like(&mut self, new_like: &NewLike) -> AppResult<Option<Like>> {
        let exists = self
            .state
            .likes
            .iter()
            .any(|l| l.from_user_id == new_like.from_user_id && l.to_user_id == new_like.to_user_id);
        if exists {
            return Ok(None);
        }

        let like = Like {
            id: Uuid::new_v4(),
            from_user_id: new_like.from_user_id,
            to_user_id: new_like.to_user_id,
            is_super_like: new_like.is_super_like,
            created_at: Utc::now(),
        };
        self.state.likes.push(like.clone());
        Ok(Some(like))
    }

    fn find_like(&mut self, from_user_id: Uuid, to_user_id: Uuid) -> AppResult<Option<Like>> {
        Ok(self
            .state
            .likes
            .iter()
            .find(|l| l.from_user_id == from_user_id && l.to_user_id == to_user_id)
            .cloned())
    }

    fn liked_user_ids(&mut self, from_user_id: Uuid) -> AppResult<Vec<Uuid>> {
        Ok(self
            .state
            .likes
            .iter()
            .filter(|l| l.from_user_id == from_user_id)
            .map(|l| l.to_user_id)
            .collect())
    }

    fn likes_received(&mut self, to_user_id: Uuid) -> AppResult<Vec<Like>> {
        Ok(self
            .state
            .likes
            .iter()
            .rev()
            .filter(|l| l.to_user_id == to_user_id)
            .cloned()
            .collect())
    }

    fn insert_match(&mut self, new_match: &NewMatch) -> AppResult<Option<Match>> {
        if self.find_match_between(new_match.user1_id, new_match.user2_id)?.is_some() {
            return Ok(None);
        }

        let created = Match {
            id: Uuid::new_v4(),
            user1_id: new_match.user1_id,
            user2_id: new_match.user2_id,
            created_at: Utc::now(),
        };
        self.state.matches.push(created.clone());
        Ok(Some(created))
    }

    fn find_match_between(&mut self, a: Uuid, b: Uuid) -> AppResult<Option<Match>> {
        Ok(self.state.matches.iter().find(|m| m.is_between(a, b)).cloned())
    }

    fn find_match(&mut self, id: Uuid) -> AppResult<Option<Match>> {
        Ok(self.state.matches.iter().find(|m| m.id == id).cloned())
    }

    fn matches_for_user(&mut self, user_id: Uuid) -> AppResult<Vec<Match>> {
        Ok(self
            .state
            .matches
            .iter()
            .rev()
            .filter(|m| m.counterpart(user_id).is_some())
            .cloned()
            .collect())
    }

    fn insert_message(&mut self, new_message: &NewMessage) -> AppResult<Message> {
        let message = Message {
            id: Uuid::new_v4(),
            match_id: new_message.match_id,
            sender_id: new_message.sender_id,
            receiver_id: new_message.receiver_id,
            content: new_message.content.clone(),
            is_read: false,
            created_at: Utc::now(),
        };
        self.state.messages.push(message.clone());
        Ok(message)
    }

    fn messages_for_match(&mut self, match_id: Uuid) -> AppResult<Vec<Message>> {
        Ok(self
            .state
            .messages
            .iter()
            .filter(|m| m.match_id == match_id)
            .cloned()
            .collect())
    }

    fn mark_messages_read(&mut self, match_id: Uuid, receiver_id: Uuid) -> AppResult<usize> {
        let mut updated = 0;
        for message in self
            .state
            .messages
            .iter_mut()
            .filter(|m| m.match_id == match_id && m.receiver_id == receiver_id && !m.is_read)
        {
            message.is_read = true;
            updated += 1;
        }
        Ok(updated)
    }

    fn unread_count(&mut self, user_id: Uuid) -> AppResult<i64> {
        Ok(self
            .state
            .messages
            .iter()
            .filter(|m| m.receiver_id == user_id && !m.is_read)
            .count() as i64)
    }
}
