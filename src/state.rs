use crate::errors::MessageError;
use crate::messages;
use crate::models::{MailboxDirectory, Message, Role};
use crate::provider::PaymentProvider;
use crate::scheduler::RetryRequest;
use crate::storage::Storage;
use crossbeam_channel::Sender as CbSender;
use std::sync::Arc;

// ── Core state ───────────────────────────────────────────────────────────────
// Everything a request handler needs, cheap to clone: the mailbox directory,
// the storage handle, the external payment provider, and the sender side of
// the retry pipeline. Domain operations are synchronous; the only
// cross-thread machinery is the retry channel drained by the worker spawned
// in main.
#[derive(Clone)]
pub struct Clinic {
    pub directory: MailboxDirectory,
    pub storage: Arc<dyn Storage>,
    pub provider: Arc<dyn PaymentProvider>,
    pub retry_tx: CbSender<RetryRequest>,
}

impl Clinic {
    pub fn new(
        storage: Arc<dyn Storage>,
        provider: Arc<dyn PaymentProvider>,
        retry_tx: CbSender<RetryRequest>,
    ) -> Self {
        Clinic {
            directory: MailboxDirectory,
            storage,
            provider,
            retry_tx,
        }
    }

    /// Direct delivery used when clinic staff open a conversation — the
    /// doctor writing to a patient, say. Patient replies go through
    /// `messages::create_reply`, which verifies the reply chain first.
    pub fn deliver(&self, from: Role, to: Role, body: &str) -> Result<Message, MessageError> {
        let message = Message::new(
            body,
            self.directory.inbox_of(to),
            self.directory.outbox_of(from),
        );
        self.storage.insert_message(message.clone())?;
        messages::refresh_unread(self, &message.inbox_id);
        Ok(message)
    }
}
