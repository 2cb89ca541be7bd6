use metrics::counter;
use serde::Serialize;
use uuid::Uuid;

use meetwalk_shared::errors::{AppError, AppResult, ErrorCode};

use crate::models::{Like, Match, NewLike, NewMatch};
use crate::services::ledger;
use crate::store::Repository;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeOutcome {
    pub like: Like,
    #[serde(rename = "match")]
    pub matched: Option<Match>,
    /// True only when this call created the match.
    pub is_match: bool,
}

/// Records `from -> to` and creates the match when the reverse like exists.
///
/// Runs inside the caller's transaction. Both user rows are locked first, so
/// two reciprocal likes cannot both miss each other and the balance check,
/// like insert, debit and match insert commit together. Repeating a like
/// returns the stored row without charging again.
pub fn record_like(
    repo: &mut dyn Repository,
    from_user_id: Uuid,
    to_user_id: Uuid,
    is_super_like: bool,
) -> AppResult<LikeOutcome> {
    if from_user_id == to_user_id {
        return Err(AppError::new(ErrorCode::CannotLikeSelf, "you cannot like yourself"));
    }

    let locked = repo.lock_users(&[from_user_id, to_user_id])?;
    let from = locked
        .iter()
        .find(|u| u.id == from_user_id)
        .ok_or_else(AppError::user_not_found)?;
    if !locked.iter().any(|u| u.id == to_user_id) {
        return Err(AppError::user_not_found());
    }

    if is_super_like && from.super_like_balance <= 0 {
        return Err(ledger::insufficient_super_likes());
    }

    let inserted = repo.insert_like(&NewLike { from_user_id, to_user_id, is_super_like })?;
    let Some(like) = inserted else {
        let existing = repo
            .find_like(from_user_id, to_user_id)?
            .ok_or_else(|| AppError::internal("like vanished after conflict"))?;
        tracing::debug!(from = %from_user_id, to = %to_user_id, "like already recorded");
        return Ok(LikeOutcome { like: existing, matched: None, is_match: false });
    };

    // Charged only for a new row; a failed debit rolls the insert back.
    if is_super_like {
        ledger::debit_one(repo, from_user_id)?;
    }

    counter!("likes_recorded_total", "super" => is_super_like.to_string()).increment(1);

    let matched = if repo.find_like(to_user_id, from_user_id)?.is_some()
        && repo.find_match_between(from_user_id, to_user_id)?.is_none()
    {
        repo.insert_match(&NewMatch { user1_id: from_user_id, user2_id: to_user_id })?
    } else {
        None
    };

    if let Some(m) = &matched {
        counter!("matches_created_total").increment(1);
        tracing::info!(match_id = %m.id, user1 = %m.user1_id, user2 = %m.user2_id, "match created");
    }

    Ok(LikeOutcome { like, is_match: matched.is_some(), matched })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewUser, User};
    use crate::store::{transaction, MemoryStore};

    fn seed(store: &MemoryStore, email: &str) -> User {
        transaction(store, |repo| {
            repo.insert_user(&NewUser {
                name: email.to_string(),
                email: email.to_string(),
                ..Default::default()
            })
        })
        .unwrap()
    }

    fn like(store: &MemoryStore, from: &User, to: &User, is_super: bool) -> AppResult<LikeOutcome> {
        transaction(store, |repo| record_like(repo, from.id, to.id, is_super))
    }

    fn balance(store: &MemoryStore, user: &User) -> i32 {
        transaction(store, |repo| repo.find_user(user.id))
            .unwrap()
            .unwrap()
            .super_like_balance
    }

    #[test]
    fn mutual_likes_create_one_match() {
        let store = MemoryStore::new();
        let (a, b) = (seed(&store, "a@x.com"), seed(&store, "b@x.com"));

        let first = like(&store, &a, &b, false).unwrap();
        assert!(!first.is_match);
        assert!(first.matched.is_none());

        let second = like(&store, &b, &a, false).unwrap();
        assert!(second.is_match);
        let m = second.matched.unwrap();
        assert!(m.is_between(a.id, b.id));

        let matches = transaction(&store, |repo| repo.matches_for_user(a.id)).unwrap();
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn third_party_like_does_not_match() {
        let store = MemoryStore::new();
        let (a, b, c) = (seed(&store, "a@x.com"), seed(&store, "b@x.com"), seed(&store, "c@x.com"));

        like(&store, &a, &b, false).unwrap();
        let outcome = like(&store, &c, &a, false).unwrap();
        assert!(!outcome.is_match);
    }

    #[test]
    fn existing_match_is_not_reported_again() {
        let store = MemoryStore::new();
        let (a, b) = (seed(&store, "a@x.com"), seed(&store, "b@x.com"));

        transaction(&store, |repo| {
            repo.insert_match(&NewMatch { user1_id: b.id, user2_id: a.id })?;
            repo.insert_like(&NewLike { from_user_id: b.id, to_user_id: a.id, is_super_like: false })
        })
        .unwrap();

        let outcome = like(&store, &a, &b, false).unwrap();
        assert!(!outcome.is_match);
        assert!(outcome.matched.is_none());
        assert_eq!(transaction(&store, |repo| repo.matches_for_user(a.id)).unwrap().len(), 1);
    }

    #[test]
    fn repeated_like_returns_the_same_row() {
        let store = MemoryStore::new();
        let (a, b) = (seed(&store, "a@x.com"), seed(&store, "b@x.com"));

        let first = like(&store, &a, &b, false).unwrap();
        let again = like(&store, &a, &b, false).unwrap();
        assert_eq!(first.like.id, again.like.id);
        assert!(!again.is_match);
        assert_eq!(transaction(&store, |repo| repo.likes_received(b.id)).unwrap().len(), 1);
    }

    #[test]
    fn super_like_debits_exactly_once() {
        let store = MemoryStore::new();
        let (a, b) = (seed(&store, "a@x.com"), seed(&store, "b@x.com"));
        transaction(&store, |repo| repo.credit_super_likes(a.id, 1)).unwrap();

        let outcome = like(&store, &a, &b, true).unwrap();
        assert!(outcome.like.is_super_like);
        assert_eq!(balance(&store, &a), 0);

        let c = seed(&store, "c@x.com");
        let err = like(&store, &a, &c, true).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::InsufficientSuperLikes));
        assert_eq!(balance(&store, &a), 0);

        // nothing persisted for the rejected attempt
        let liked = transaction(&store, |repo| repo.liked_user_ids(a.id)).unwrap();
        assert_eq!(liked, vec![b.id]);
    }

    #[test]
    fn repeated_super_like_is_not_charged_twice() {
        let store = MemoryStore::new();
        let (a, b) = (seed(&store, "a@x.com"), seed(&store, "b@x.com"));
        transaction(&store, |repo| repo.credit_super_likes(a.id, 5)).unwrap();

        like(&store, &a, &b, true).unwrap();
        like(&store, &a, &b, true).unwrap();
        assert_eq!(balance(&store, &a), 4);
    }

    #[test]
    fn like_that_loses_the_insert_race_is_not_charged() {
        let store = MemoryStore::new();
        let (a, b) = (seed(&store, "a@x.com"), seed(&store, "b@x.com"));
        let stored = transaction(&store, |repo| {
            repo.credit_super_likes(a.id, 3)?;
            repo.insert_like(&NewLike { from_user_id: a.id, to_user_id: b.id, is_super_like: true })
        })
        .unwrap()
        .unwrap();

        let outcome = like(&store, &a, &b, true).unwrap();
        assert_eq!(outcome.like.id, stored.id);
        assert!(!outcome.is_match);
        assert_eq!(balance(&store, &a), 3);
    }

    #[test]
    fn self_like_is_rejected() {
        let store = MemoryStore::new();
        let a = seed(&store, "a@x.com");

        let err = like(&store, &a, &a, false).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::CannotLikeSelf));
    }

    #[test]
    fn unknown_target_is_not_found() {
        let store = MemoryStore::new();
        let a = seed(&store, "a@x.com");

        let err = transaction(&store, |repo| record_like(repo, a.id, Uuid::new_v4(), false)).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::UserNotFound));
    }

    #[test]
    fn outcome_serializes_with_match_key() {
        let store = MemoryStore::new();
        let (a, b) = (seed(&store, "a@x.com"), seed(&store, "b@x.com"));

        let json = serde_json::to_value(like(&store, &a, &b, false).unwrap()).unwrap();
        assert_eq!(json["isMatch"], false);
        assert!(json["match"].is_null());
        assert_eq!(json["like"]["fromUserId"], a.id.to_string());
    }
}
