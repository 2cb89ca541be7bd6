use uuid::Uuid;

use meetwalk_shared::errors::{AppError, AppResult, ErrorCode};

use crate::models::User;
use crate::store::Repository;

pub const MAX_CREDIT_PER_PURCHASE: i32 = 1000;

pub fn insufficient_super_likes() -> AppError {
    AppError::new(
        ErrorCode::InsufficientSuperLikes,
        "Your super like balance is empty. Buy a pack to keep going!",
    )
}

/// Takes one super-like credit from `user_id`, failing when the balance is zero.
pub fn debit_one(repo: &mut dyn Repository, user_id: Uuid) -> AppResult<()> {
    if repo.debit_super_like(user_id)? {
        Ok(())
    } else {
        Err(insufficient_super_likes())
    }
}

/// Adds `amount` credits. No payment verification happens here.
pub fn credit(repo: &mut dyn Repository, user_id: Uuid, amount: i32) -> AppResult<User> {
    if !(1..=MAX_CREDIT_PER_PURCHASE).contains(&amount) {
        return Err(AppError::bad_request(format!(
            "amount must be between 1 and {MAX_CREDIT_PER_PURCHASE}"
        )));
    }

    let user = repo
        .credit_super_likes(user_id, amount)?
        .ok_or_else(AppError::user_not_found)?;

    tracing::info!(
        user_id = %user_id,
        amount,
        balance = user.super_like_balance,
        "super likes credited"
    );

    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewUser;
    use crate::store::{transaction, MemoryStore};

    fn seed(store: &MemoryStore) -> User {
        transaction(store, |repo| {
            repo.insert_user(&NewUser {
                name: "Mert".into(),
                email: "mert@example.com".into(),
                ..Default::default()
            })
        })
        .unwrap()
    }

    #[test]
    fn credit_adds_to_balance() {
        let store = MemoryStore::new();
        let user = seed(&store);

        transaction(&store, |repo| credit(repo, user.id, 10)).unwrap();
        let after = transaction(&store, |repo| credit(repo, user.id, 5)).unwrap();
        assert_eq!(after.super_like_balance, 15);
    }

    #[test]
    fn credit_rejects_non_positive_amounts() {
        let store = MemoryStore::new();
        let user = seed(&store);

        for amount in [0, -3, MAX_CREDIT_PER_PURCHASE + 1] {
            let err = transaction(&store, |repo| credit(repo, user.id, amount)).unwrap_err();
            assert_eq!(err.code(), Some(ErrorCode::BadRequest));
        }
    }

    #[test]
    fn credit_unknown_user_is_not_found() {
        let store = MemoryStore::new();
        let err = transaction(&store, |repo| credit(repo, Uuid::new_v4(), 1)).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::UserNotFound));
    }

    #[test]
    fn debit_on_empty_balance_fails() {
        let store = MemoryStore::new();
        let user = seed(&store);

        let err = transaction(&store, |repo| debit_one(repo, user.id)).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::InsufficientSuperLikes));
    }
}
