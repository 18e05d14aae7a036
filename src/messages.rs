use crate::errors::MessageError;
use crate::models::{MailboxDirectory, Message, Role};
use crate::state::Clinic;
use crate::storage::Storage;
use chrono::Utc;

/// Replies stay with the doctor for a week; after that the conversation is
/// considered stale and is escalated to the admin staff instead.
pub const REPLY_WINDOW_DAYS: i64 = 7;

// ── Access Verifier ──────────────────────────────────────────────────────────
// A reply is only legitimate when the referenced message exists, the replier
// is its recipient, and it was sent by the doctor. Runs before any storage
// write: no message may ever be created from a reference that failed here.
pub fn verify_reply(
    clinic: &Clinic,
    original_message_id: &str,
    replier: Role,
) -> Result<Message, MessageError> {
    if original_message_id.trim().is_empty() {
        return Err(MessageError::ReferenceMissing);
    }
    let original = clinic
        .storage
        .find_message(original_message_id)
        .ok_or_else(|| MessageError::NotFound(original_message_id.to_string()))?;

    let replier_is_recipient =
        clinic.directory.owner_of_inbox(&original.inbox_id) == Some(replier);
    let sent_by_doctor = original.outbox_id == clinic.directory.outbox_of(Role::Doctor);
    if !replier_is_recipient || !sent_by_doctor {
        return Err(MessageError::HackAttempt);
    }
    Ok(original)
}

// ── Routing Engine ───────────────────────────────────────────────────────────
/// Destination inbox for a reply to `original`: whole-day age up to
/// REPLY_WINDOW_DAYS goes to the doctor, anything older to the admin.
/// Fractional days truncate toward zero, so the boundary day still reaches
/// the doctor.
pub fn route(directory: &MailboxDirectory, original: &Message) -> String {
    let days_since_original =
        (Utc::now().date_naive() - original.created_at.date_naive()).num_days();
    if days_since_original <= REPLY_WINDOW_DAYS {
        directory.inbox_of(Role::Doctor)
    } else {
        directory.inbox_of(Role::Admin)
    }
}

// ── Unread Counter ───────────────────────────────────────────────────────────
/// Recompute the denormalized unread count after a delivery or a read. Only
/// the doctor's inbox is tracked — an explicit product policy, so the
/// predicate is the first thing this function states. The count is always
/// recomputed from the store, never adjusted in place.
pub fn refresh_unread(clinic: &Clinic, inbox_id: &str) {
    if clinic.directory.owner_of_inbox(inbox_id) != Some(Role::Doctor) {
        return;
    }
    let unread = clinic.storage.unread_count_in(inbox_id);
    clinic.storage.set_inbox_unread(inbox_id, unread);
}

// ── Reply creation ───────────────────────────────────────────────────────────
/// Verify, route, persist, refresh. Verification failures propagate
/// unchanged; a store rejection surfaces as SaveRejected with nothing
/// persisted.
pub fn create_reply(
    clinic: &Clinic,
    sender: Role,
    body: &str,
    original_message_id: &str,
) -> Result<Message, MessageError> {
    let original = verify_reply(clinic, original_message_id, sender)?;
    let inbox_id = route(&clinic.directory, &original);
    let message = Message::new(body, inbox_id, clinic.directory.outbox_of(sender));
    clinic.storage.insert_message(message.clone())?;
    refresh_unread(clinic, &message.inbox_id);
    Ok(message)
}

// ── Read transition ──────────────────────────────────────────────────────────
/// Flip `read` false→true exactly once and refresh the inbox's unread count.
/// Reading an already-read message changes nothing.
pub fn mark_read(clinic: &Clinic, message_id: &str) -> Result<Message, MessageError> {
    let mut message = clinic
        .storage
        .find_message(message_id)
        .ok_or_else(|| MessageError::NotFound(message_id.to_string()))?;
    if !message.read {
        message.read = true;
        clinic.storage.update_message(message.clone());
        refresh_unread(clinic, &message.inbox_id);
    }
    Ok(message)
}
