use crate::errors::StorageError;
use crate::models::{Inbox, MailboxDirectory, Message, Payment, Role};
use dashmap::DashMap;

const MAX_BODY_LEN: usize = 65_536; // 64 KB

// ── Storage seam ─────────────────────────────────────────────────────────────
// The domain layer talks to storage through this trait only. The shipped
// implementation is the in-memory store below; tests substitute failing
// fakes to exercise the transient-failure paths.
pub trait Storage: Send + Sync {
    fn find_message(&self, id: &str) -> Option<Message>;

    /// Check a message against the write-validation rules without storing it.
    fn validate_message(&self, message: &Message) -> Result<(), StorageError>;

    /// Validate and store. Nothing is written when validation fails.
    fn insert_message(&self, message: Message) -> Result<(), StorageError>;

    /// Replace a stored message. Used only for the one-way read transition.
    fn update_message(&self, message: Message);

    fn remove_message(&self, id: &str);

    fn validate_payment(&self, payment: &Payment) -> Result<(), StorageError>;

    fn insert_payment(&self, payment: Payment) -> Result<(), StorageError>;

    fn remove_payment(&self, id: &str);

    fn payment_count(&self) -> usize;

    fn messages_in(&self, inbox_id: &str) -> Vec<Message>;

    fn unread_count_in(&self, inbox_id: &str) -> usize;

    fn inbox(&self, inbox_id: &str) -> Option<Inbox>;

    fn set_inbox_unread(&self, inbox_id: &str, unread: usize);
}

// ── In-memory store ──────────────────────────────────────────────────────────
// Lock-free DashMap state, ephemeral by design: persistence mechanics live
// behind the Storage trait and this process keeps everything in memory. The
// three fixed mailboxes are seeded at construction with the unread count
// unset.
pub struct MemoryStore {
    messages: DashMap<String, Message>,
    payments: DashMap<String, Payment>,
    inboxes: DashMap<String, Inbox>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let directory = MailboxDirectory;
        let inboxes = DashMap::new();
        for role in Role::ALL {
            let id = directory.inbox_of(role);
            inboxes.insert(
                id.clone(),
                Inbox {
                    id,
                    owner: role,
                    unread_count: None,
                },
            );
        }
        MemoryStore {
            messages: DashMap::new(),
            payments: DashMap::new(),
            inboxes,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MemoryStore {
    fn find_message(&self, id: &str) -> Option<Message> {
        self.messages.get(id).map(|m| m.clone())
    }

    fn validate_message(&self, message: &Message) -> Result<(), StorageError> {
        if message.body.trim().is_empty() {
            return Err(StorageError::Invalid("body must not be empty".into()));
        }
        if message.body.len() > MAX_BODY_LEN {
            return Err(StorageError::Invalid(format!(
                "body exceeds {} byte limit",
                MAX_BODY_LEN
            )));
        }
        if message.inbox_id.is_empty() || message.outbox_id.is_empty() {
            return Err(StorageError::Invalid(
                "message must have an inbox and an outbox".into(),
            ));
        }
        Ok(())
    }

    fn insert_message(&self, message: Message) -> Result<(), StorageError> {
        self.validate_message(&message)?;
        self.messages.insert(message.id.clone(), message);
        Ok(())
    }

    fn update_message(&self, message: Message) {
        self.messages.insert(message.id.clone(), message);
    }

    fn remove_message(&self, id: &str) {
        self.messages.remove(id);
    }

    fn validate_payment(&self, payment: &Payment) -> Result<(), StorageError> {
        if payment.amount_cents <= 0 {
            return Err(StorageError::Invalid(
                "payment amount must be positive".into(),
            ));
        }
        Ok(())
    }

    fn insert_payment(&self, payment: Payment) -> Result<(), StorageError> {
        self.validate_payment(&payment)?;
        self.payments.insert(payment.id.clone(), payment);
        Ok(())
    }

    fn remove_payment(&self, id: &str) {
        self.payments.remove(id);
    }

    fn payment_count(&self) -> usize {
        self.payments.len()
    }

    fn messages_in(&self, inbox_id: &str) -> Vec<Message> {
        let mut messages: Vec<Message> = self
            .messages
            .iter()
            .filter(|entry| entry.inbox_id == inbox_id)
            .map(|entry| entry.clone())
            .collect();
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        messages
    }

    fn unread_count_in(&self, inbox_id: &str) -> usize {
        self.messages
            .iter()
            .filter(|entry| entry.inbox_id == inbox_id && !entry.read)
            .count()
    }

    fn inbox(&self, inbox_id: &str) -> Option<Inbox> {
        self.inboxes.get(inbox_id).map(|i| i.clone())
    }

    fn set_inbox_unread(&self, inbox_id: &str, unread: usize) {
        if let Some(mut inbox) = self.inboxes.get_mut(inbox_id) {
            inbox.unread_count = Some(unread);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doctor_note(directory: &MailboxDirectory, body: &str) -> Message {
        Message::new(
            body,
            directory.inbox_of(Role::Patient),
            directory.outbox_of(Role::Doctor),
        )
    }

    #[test]
    fn seeds_the_three_fixed_mailboxes_with_unread_unset() {
        let store = MemoryStore::new();
        let directory = MailboxDirectory;
        for role in Role::ALL {
            let inbox = store.inbox(&directory.inbox_of(role)).unwrap();
            assert_eq!(inbox.owner, role);
            assert_eq!(inbox.unread_count, None, "unread starts unset for {:?}", role);
        }
    }

    #[test]
    fn insert_then_find_round_trips() {
        let store = MemoryStore::new();
        let message = doctor_note(&MailboxDirectory, "Your results are in");
        store.insert_message(message.clone()).unwrap();

        let found = store.find_message(&message.id).unwrap();
        assert_eq!(found.body, "Your results are in");
        assert!(!found.read);
    }

    #[test]
    fn empty_body_is_rejected_and_not_stored() {
        let store = MemoryStore::new();
        let message = doctor_note(&MailboxDirectory, "   ");
        let result = store.insert_message(message.clone());

        assert!(result.is_err(), "Whitespace-only body must be rejected");
        assert!(store.find_message(&message.id).is_none());
    }

    #[test]
    fn oversized_body_is_rejected() {
        let store = MemoryStore::new();
        let message = doctor_note(&MailboxDirectory, &"x".repeat(MAX_BODY_LEN + 1));
        assert!(store.insert_message(message).is_err());
    }

    #[test]
    fn unread_count_tracks_only_the_requested_inbox() {
        let store = MemoryStore::new();
        let directory = MailboxDirectory;
        let doctor_inbox = directory.inbox_of(Role::Doctor);
        let admin_inbox = directory.inbox_of(Role::Admin);

        let to_doctor = Message::new("a", doctor_inbox.clone(), directory.outbox_of(Role::Patient));
        let to_admin = Message::new("b", admin_inbox.clone(), directory.outbox_of(Role::Patient));
        store.insert_message(to_doctor.clone()).unwrap();
        store.insert_message(to_admin).unwrap();

        assert_eq!(store.unread_count_in(&doctor_inbox), 1);
        assert_eq!(store.unread_count_in(&admin_inbox), 1);

        let mut read = to_doctor;
        read.read = true;
        store.update_message(read);
        assert_eq!(store.unread_count_in(&doctor_inbox), 0);
        assert_eq!(store.unread_count_in(&admin_inbox), 1);
    }

    #[test]
    fn non_positive_payment_is_rejected() {
        let store = MemoryStore::new();
        let mut payment = Payment::prescription_charge(Role::Patient);
        payment.amount_cents = 0;
        assert!(store.insert_payment(payment).is_err());
        assert_eq!(store.payment_count(), 0);
    }

    #[test]
    fn messages_in_returns_inbox_contents_in_arrival_order() {
        let store = MemoryStore::new();
        let directory = MailboxDirectory;
        let first = doctor_note(&directory, "first");
        let mut second = doctor_note(&directory, "second");
        second.created_at = first.created_at + chrono::Duration::seconds(1);
        store.insert_message(second).unwrap();
        store.insert_message(first).unwrap();

        let inbox = store.messages_in(&directory.inbox_of(Role::Patient));
        assert_eq!(inbox.len(), 2);
        assert_eq!(inbox[0].body, "first");
        assert_eq!(inbox[1].body, "second");
    }
}
