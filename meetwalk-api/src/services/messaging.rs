use chrono::{DateTime, Utc};
use metrics::counter;
use uuid::Uuid;

use meetwalk_shared::errors::{AppError, AppResult, ErrorCode};

use crate::models::{Match, Message, NewMessage};
use crate::store::Repository;

#[derive(Debug, Clone, Copy, Default)]
pub struct MessagingPolicy {
    pub require_premium: bool,
    pub enforce_premium_expiry: bool,
}

#[derive(Debug, Clone)]
pub struct OutgoingMessage {
    pub match_id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub content: String,
}

fn load_match(repo: &mut dyn Repository, match_id: Uuid) -> AppResult<Match> {
    repo.find_match(match_id)?
        .ok_or_else(|| AppError::new(ErrorCode::MatchNotFound, "match not found"))
}

/// Stores a message between the two participants of a match.
pub fn send_message(
    repo: &mut dyn Repository,
    outgoing: OutgoingMessage,
    policy: &MessagingPolicy,
    now: DateTime<Utc>,
) -> AppResult<Message> {
    let content = outgoing.content.trim();
    if content.is_empty() {
        return Err(AppError::new(ErrorCode::EmptyMessage, "message content cannot be empty"));
    }

    let m = load_match(repo, outgoing.match_id)?;
    if outgoing.sender_id == outgoing.receiver_id || !m.is_between(outgoing.sender_id, outgoing.receiver_id) {
        return Err(AppError::new(
            ErrorCode::NotMatchParticipant,
            "sender and receiver must be the two users of this match",
        ));
    }

    if policy.require_premium {
        let sender = repo
            .find_user(outgoing.sender_id)?
            .ok_or_else(AppError::user_not_found)?;
        if !sender.has_premium(now, policy.enforce_premium_expiry) {
            return Err(AppError::new(
                ErrorCode::PremiumRequired,
                "Messaging is a Gold feature. Upgrade to start chatting!",
            ));
        }
    }

    let message = repo.insert_message(&NewMessage {
        match_id: m.id,
        sender_id: outgoing.sender_id,
        receiver_id: outgoing.receiver_id,
        content: content.to_string(),
    })?;

    counter!("messages_sent_total").increment(1);
    tracing::debug!(match_id = %m.id, message_id = %message.id, "message stored");

    Ok(message)
}

/// Thread for a match, oldest first.
pub fn list_messages(repo: &mut dyn Repository, match_id: Uuid) -> AppResult<Vec<Message>> {
    let m = load_match(repo, match_id)?;
    repo.messages_for_match(m.id)
}

/// Marks everything addressed to `receiver_id` in the match as read.
/// Returns how many messages flipped; calling again returns 0.
pub fn mark_read(repo: &mut dyn Repository, match_id: Uuid, receiver_id: Uuid) -> AppResult<usize> {
    let m = load_match(repo, match_id)?;
    if m.counterpart(receiver_id).is_none() {
        return Err(AppError::new(ErrorCode::NotMatchParticipant, "receiver is not part of this match"));
    }

    let updated = repo.mark_messages_read(m.id, receiver_id)?;
    tracing::debug!(match_id = %m.id, receiver_id = %receiver_id, updated, "messages marked read");
    Ok(updated)
}

/// Unread messages addressed to the user across every match.
pub fn unread_count(repo: &mut dyn Repository, user_id: Uuid) -> AppResult<i64> {
    repo.unread_count(user_id)
}
