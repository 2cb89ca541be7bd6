use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::schema::{likes, matches, messages, users};
use crate::services::geo::Coordinates;

// --- User ---

#[derive(Debug, Queryable, Identifiable, Serialize, Deserialize, Clone, PartialEq)]
#[diesel(table_name = users)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub bio: Option<String>,
    pub age: Option<i32>,
    pub gender: Option<String>,
    pub photos: Vec<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub is_premium: bool,
    pub premium_expires_at: Option<DateTime<Utc>>,
    pub max_distance: i32,
    pub min_age: i32,
    pub max_age: i32,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    pub daily_usage_minutes: i32,
    pub last_usage_reset: DateTime<Utc>,
    pub super_like_balance: i32,
}

impl User {
    /// Last known location. Latitude and longitude are stored both-or-neither.
    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinates::new(latitude, longitude)),
            _ => None,
        }
    }

    /// Premium entitlement at `now`. The stored expiry only matters when
    /// `enforce_expiry` is set; otherwise the flag alone decides.
    pub fn has_premium(&self, now: DateTime<Utc>, enforce_expiry: bool) -> bool {
        if !self.is_premium {
            return false;
        }
        match (enforce_expiry, self.premium_expires_at) {
            (true, Some(expires_at)) => expires_at > now,
            _ => true,
        }
    }
}

#[derive(Debug, Insertable, Clone, Default)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub bio: Option<String>,
    pub age: Option<i32>,
    pub gender: Option<String>,
    pub photos: Option<Vec<String>>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub max_distance: Option<i32>,
    pub min_age: Option<i32>,
    pub max_age: Option<i32>,
}

/// Profile fields a user may edit. Premium, super-like balance and usage
/// counters only move through their own operations.
#[derive(Debug, AsChangeset, Deserialize, Validate, Default, Clone)]
#[diesel(table_name = users)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfile {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(length(max = 500))]
    pub bio: Option<String>,
    #[validate(range(min = 18, max = 120))]
    pub age: Option<i32>,
    #[validate(length(max = 32))]
    pub gender: Option<String>,
    #[validate(length(max = 9))]
    pub photos: Option<Vec<String>>,
    #[validate(range(min = 1, max = 500))]
    pub max_distance: Option<i32>,
    #[validate(range(min = 18, max = 120))]
    pub min_age: Option<i32>,
    #[validate(range(min = 18, max = 120))]
    pub max_age: Option<i32>,
}

// --- Like ---

#[derive(Debug, Queryable, Identifiable, Serialize, Deserialize, Clone, PartialEq)]
#[diesel(table_name = likes)]
#[serde(rename_all = "camelCase")]
pub struct Like {
    pub id: Uuid,
    pub from_user_id: Uuid,
    pub to_user_id: Uuid,
    pub is_super_like: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable, Clone)]
#[diesel(table_name = likes)]
pub struct NewLike {
    pub from_user_id: Uuid,
    pub to_user_id: Uuid,
    pub is_super_like: bool,
}

// --- Match ---

#[derive(Debug, Queryable, Identifiable, Serialize, Deserialize, Clone, PartialEq)]
#[diesel(table_name = matches)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub id: Uuid,
    pub user1_id: Uuid,
    pub user2_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Match {
    /// True when `{a, b}` is this match's unordered pair.
    pub fn is_between(&self, a: Uuid, b: Uuid) -> bool {
        (self.user1_id == a && self.user2_id == b) || (self.user1_id == b && self.user2_id == a)
    }

    pub fn counterpart(&self, user_id: Uuid) -> Option<Uuid> {
        if self.user1_id == user_id {
            Some(self.user2_id)
        } else if self.user2_id == user_id {
            Some(self.user1_id)
        } else {
            None
        }
    }
}

#[derive(Debug, Insertable, Clone)]
#[diesel(table_name = matches)]
pub struct NewMatch {
    pub user1_id: Uuid,
    pub user2_id: Uuid,
}

// --- Message ---

#[derive(Debug, Queryable, Identifiable, Serialize, Deserialize, Clone, PartialEq)]
#[diesel(table_name = messages)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub match_id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub content: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable, Clone)]
#[diesel(table_name = messages)]
pub struct NewMessage {
    pub match_id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub content: String,
}
