use chrono::{DateTime, Local, TimeZone, Utc};
use metrics::counter;
use serde::Serialize;

use meetwalk_shared::errors::{AppError, AppResult, ErrorCode};

use crate::models::User;
use crate::store::Repository;

/// Free-tier discovery allowance.
#[derive(Debug, Clone, Copy)]
pub struct QuotaPolicy {
    pub daily_free_minutes: i32,
    pub enforce_premium_expiry: bool,
}

impl Default for QuotaPolicy {
    fn default() -> Self {
        Self {
            daily_free_minutes: 120,
            enforce_premium_expiry: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "camelCase")]
pub enum QuotaDecision {
    Allowed,
    #[serde(rename_all = "camelCase")]
    DailyLimitReached { used_minutes: i32, limit_minutes: i32 },
}

impl QuotaDecision {
    /// Denials become the 403 the discovery route returns and are counted
    /// in `discovery_denied_total`.
    pub fn into_result(self) -> AppResult<()> {
        match self {
            QuotaDecision::Allowed => Ok(()),
            QuotaDecision::DailyLimitReached { used_minutes, limit_minutes } => {
                counter!("discovery_denied_total").increment(1);
                tracing::info!(used_minutes, limit_minutes, "discovery denied by daily limit");
                Err(AppError::new(
                    ErrorCode::DailyLimitReached,
                    format!(
                        "You have used your {limit_minutes} free minutes for today. Upgrade to Gold for unlimited access!"
                    ),
                ))
            }
        }
    }
}

/// True when `last_reset` and `now` fall on different calendar days in `tz`.
pub fn crosses_day_boundary<Tz: TimeZone>(last_reset: DateTime<Utc>, now: DateTime<Utc>, tz: &Tz) -> bool {
    last_reset.with_timezone(tz).date_naive() != now.with_timezone(tz).date_naive()
}

/// Applies the day-boundary reset (persisting it) and returns the user as stored afterwards.
fn reset_if_new_day<Tz: TimeZone>(
    repo: &mut dyn Repository,
    user: User,
    now: DateTime<Utc>,
    tz: &Tz,
) -> AppResult<User> {
    if !crosses_day_boundary(user.last_usage_reset, now, tz) {
        return Ok(user);
    }

    tracing::debug!(user_id = %user.id, previous_minutes = user.daily_usage_minutes, "daily usage reset");
    repo.reset_usage(user.id, now)?.ok_or_else(AppError::user_not_found)
}

/// Gate run before nearby discovery. Premium users always pass; everyone
/// else is denied once the day's usage reaches the limit. Usage is not
/// incremented here: metering goes through [`record_usage`].
pub fn check_quota(
    repo: &mut dyn Repository,
    user: User,
    policy: &QuotaPolicy,
    now: DateTime<Utc>,
) -> AppResult<(QuotaDecision, User)> {
    check_quota_in(repo, user, policy, now, &Local)
}

pub fn check_quota_in<Tz: TimeZone>(
    repo: &mut dyn Repository,
    user: User,
    policy: &QuotaPolicy,
    now: DateTime<Utc>,
    tz: &Tz,
) -> AppResult<(QuotaDecision, User)> {
    if user.has_premium(now, policy.enforce_premium_expiry) {
        return Ok((QuotaDecision::Allowed, user));
    }

    let user = reset_if_new_day(repo, user, now, tz)?;

    let decision = if user.daily_usage_minutes >= policy.daily_free_minutes {
        QuotaDecision::DailyLimitReached {
            used_minutes: user.daily_usage_minutes,
            limit_minutes: policy.daily_free_minutes,
        }
    } else {
        QuotaDecision::Allowed
    };

    Ok((decision, user))
}

/// Adds metered minutes to today's counter, resetting first if the day rolled over.
pub fn record_usage(
    repo: &mut dyn Repository,
    user: User,
    minutes: i32,
    now: DateTime<Utc>,
) -> AppResult<User> {
    record_usage_in(repo, user, minutes, now, &Local)
}

pub fn record_usage_in<Tz: TimeZone>(
    repo: &mut dyn Repository,
    user: User,
    minutes: i32,
    now: DateTime<Utc>,
    tz: &Tz,
) -> AppResult<User> {
    let user = reset_if_new_day(repo, user, now, tz)?;
    repo.add_usage(user.id, minutes)?.ok_or_else(AppError::user_not_found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, FixedOffset};

    use crate::models::NewUser;
    use crate::store::{transaction, MemoryStore};

    fn seed(store: &MemoryStore, minutes: i32, last_reset: DateTime<Utc>, premium: bool) -> User {
        transaction(store, |repo| {
            let user = repo.insert_user(&NewUser {
                name: "Zeynep".into(),
                email: "zeynep@example.com".into(),
                ..Default::default()
            })?;
            repo.reset_usage(user.id, last_reset)?;
            repo.add_usage(user.id, minutes)?;
            if premium {
                repo.update_premium(user.id, true, None)?;
            }
            Ok(repo.find_user(user.id)?.unwrap())
        })
        .unwrap()
    }

    fn fetch(store: &MemoryStore, user: &User) -> User {
        transaction(store, |repo| repo.find_user(user.id)).unwrap().unwrap()
    }

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn day_boundary_follows_the_given_zone() {
        let istanbul = FixedOffset::east_opt(3 * 3600).unwrap();
        let before = ts("2024-05-01T20:30:00Z"); // 23:30 local
        let after = ts("2024-05-01T21:30:00Z"); // 00:30 next day local

        assert!(crosses_day_boundary(before, after, &istanbul));
        assert!(!crosses_day_boundary(before, after, &Utc));
    }

    #[test]
    fn yesterday_usage_is_reset_before_the_check() {
        let store = MemoryStore::new();
        let now = ts("2024-05-02T10:00:00Z");
        let user = seed(&store, 119, now - Duration::days(1), false);

        let (decision, after) = transaction(&store, |repo| {
            check_quota_in(repo, user.clone(), &QuotaPolicy::default(), now, &Utc)
        })
        .unwrap();

        assert_eq!(decision, QuotaDecision::Allowed);
        assert_eq!(after.daily_usage_minutes, 0);
        assert_eq!(after.last_usage_reset, now);

        let stored = fetch(&store, &user);
        assert_eq!(stored.daily_usage_minutes, 0);
        assert_eq!(stored.last_usage_reset, now);
    }

    #[test]
    fn yesterday_over_limit_is_forgiven() {
        let store = MemoryStore::new();
        let now = ts("2024-05-02T10:00:00Z");
        let user = seed(&store, 500, now - Duration::days(1), false);

        let (decision, _) = transaction(&store, |repo| {
            check_quota_in(repo, user.clone(), &QuotaPolicy::default(), now, &Utc)
        })
        .unwrap();
        assert_eq!(decision, QuotaDecision::Allowed);
    }

    #[test]
    fn limit_reached_today_is_denied() {
        let store = MemoryStore::new();
        let now = ts("2024-05-02T10:00:00Z");
        let user = seed(&store, 120, now - Duration::hours(2), false);

        let (decision, _) = transaction(&store, |repo| {
            check_quota_in(repo, user.clone(), &QuotaPolicy::default(), now, &Utc)
        })
        .unwrap();

        assert_eq!(
            decision,
            QuotaDecision::DailyLimitReached { used_minutes: 120, limit_minutes: 120 }
        );
        let err = decision.into_result().unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::DailyLimitReached));

        // counter untouched
        assert_eq!(fetch(&store, &user).daily_usage_minutes, 120);
    }

    #[test]
    fn premium_ignores_the_limit() {
        let store = MemoryStore::new();
        let now = ts("2024-05-02T10:00:00Z");
        let user = seed(&store, 600, now, true);

        let (decision, _) = transaction(&store, |repo| {
            check_quota_in(repo, user.clone(), &QuotaPolicy::default(), now, &Utc)
        })
        .unwrap();
        assert_eq!(decision, QuotaDecision::Allowed);
    }

    #[test]
    fn lapsed_premium_is_limited_only_when_expiry_is_enforced() {
        let store = MemoryStore::new();
        let now = ts("2024-05-02T10:00:00Z");
        let user = seed(&store, 120, now, false);
        let user = transaction(&store, |repo| {
            Ok(repo.update_premium(user.id, true, Some(now - Duration::days(3)))?.unwrap())
        })
        .unwrap();

        let lenient = QuotaPolicy::default();
        let strict = QuotaPolicy { enforce_premium_expiry: true, ..QuotaPolicy::default() };

        let (decision, _) =
            transaction(&store, |repo| check_quota_in(repo, user.clone(), &lenient, now, &Utc)).unwrap();
        assert_eq!(decision, QuotaDecision::Allowed);

        let (decision, _) =
            transaction(&store, |repo| check_quota_in(repo, user.clone(), &strict, now, &Utc)).unwrap();
        assert!(matches!(decision, QuotaDecision::DailyLimitReached { .. }));
    }

    #[test]
    fn checking_does_not_meter() {
        let store = MemoryStore::new();
        let now = ts("2024-05-02T10:00:00Z");
        let user = seed(&store, 30, now, false);

        for _ in 0..3 {
            transaction(&store, |repo| {
                let current = fetch_in(repo, &user);
                check_quota_in(repo, current, &QuotaPolicy::default(), now, &Utc)
            })
            .unwrap();
        }
        assert_eq!(fetch(&store, &user).daily_usage_minutes, 30);
    }

    fn fetch_in(repo: &mut dyn Repository, user: &User) -> User {
        repo.find_user(user.id).unwrap().unwrap()
    }

    fn meter(store: &MemoryStore, user: &User, minutes: i32, now: DateTime<Utc>) -> User {
        transaction(store, |repo| {
            let current = fetch_in(repo, user);
            record_usage_in(repo, current, minutes, now, &Utc)
        })
        .unwrap()
    }

    #[test]
    fn recorded_usage_accumulates_and_rolls_over() {
        let store = MemoryStore::new();
        let day_one = ts("2024-05-01T09:00:00Z");
        let user = seed(&store, 0, day_one, false);

        let after = meter(&store, &user, 45, day_one);
        assert_eq!(after.daily_usage_minutes, 45);
        let after = meter(&store, &user, 80, day_one);
        assert_eq!(after.daily_usage_minutes, 125);

        let day_two = day_one + Duration::days(1);
        let after = meter(&store, &user, 10, day_two);
        assert_eq!(after.daily_usage_minutes, 10);
        assert_eq!(after.last_usage_reset, day_two);
    }

    #[test]
    fn denial_is_counted() {
        let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            QuotaDecision::Allowed.into_result().unwrap();
            let denied = QuotaDecision::DailyLimitReached { used_minutes: 120, limit_minutes: 120 };
            assert!(denied.into_result().is_err());
        });

        let rendered = handle.render();
        assert!(rendered.contains("discovery_denied_total 1"), "{rendered}");
    }
}
