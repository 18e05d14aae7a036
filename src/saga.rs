use crate::errors::{MessageError, StorageError};
use crate::messages;
use crate::models::{Message, Payment, Role};
use crate::scheduler::RetryRequest;
use crate::state::Clinic;
use crate::storage::Storage;
use serde::Serialize;

pub const SUCCESS_NOTICE: &str =
    "Your request was received! Your prescription will be sent to your inbox.";

#[derive(Debug, Clone, Serialize)]
pub struct SagaResult {
    pub reference: String,
    pub notice: String,
}

/// Outcome of one saga attempt. Deferred means nothing was persisted and a
/// full retry has been scheduled; hard verification failures surface as
/// `MessageError` instead.
#[derive(Debug)]
pub enum SagaOutcome {
    Completed(SagaResult),
    Deferred,
}

// ── Staged writes ────────────────────────────────────────────────────────────
// The saga's local-effects scope: records are validated and held here, and
// nothing reaches the store until commit. A partial commit failure removes
// what was already inserted, so an attempt either persists everything or
// nothing.
#[derive(Default)]
struct PendingEffects {
    payments: Vec<Payment>,
    messages: Vec<Message>,
}

impl PendingEffects {
    fn stage_payment(&mut self, storage: &dyn Storage, payment: Payment) -> Result<(), StorageError> {
        storage.validate_payment(&payment)?;
        self.payments.push(payment);
        Ok(())
    }

    fn stage_message(&mut self, storage: &dyn Storage, message: Message) -> Result<(), StorageError> {
        storage.validate_message(&message)?;
        self.messages.push(message);
        Ok(())
    }

    fn message_inboxes(&self) -> Vec<String> {
        self.messages.iter().map(|m| m.inbox_id.clone()).collect()
    }

    fn commit(self, storage: &dyn Storage) -> Result<(), StorageError> {
        let mut inserted_payments: Vec<String> = Vec::new();
        let mut inserted_messages: Vec<String> = Vec::new();

        let discard = |storage: &dyn Storage, payments: &[String], messages: &[String]| {
            for id in payments {
                storage.remove_payment(id);
            }
            for id in messages {
                storage.remove_message(id);
            }
        };

        for payment in self.payments {
            let id = payment.id.clone();
            if let Err(e) = storage.insert_payment(payment) {
                discard(storage, &inserted_payments, &inserted_messages);
                return Err(e);
            }
            inserted_payments.push(id);
        }
        for message in self.messages {
            let id = message.id.clone();
            if let Err(e) = storage.insert_message(message) {
                discard(storage, &inserted_payments, &inserted_messages);
                return Err(e);
            }
            inserted_messages.push(id);
        }
        Ok(())
    }
}

// ── Prescription saga ────────────────────────────────────────────────────────
/// Fulfil a paid prescription re-issue as three strictly ordered steps —
/// record the payment, create the admin-inbox message, debit the card —
/// inside one staged-write scope. Any transient failure discards the
/// attempt's local effects and schedules a full retry; verification failures
/// propagate to the caller and are never retried.
pub fn request_prescription(
    clinic: &Clinic,
    original_message_id: &str,
) -> Result<SagaOutcome, MessageError> {
    let storage = clinic.storage.as_ref();
    let mut effects = PendingEffects::default();

    // Step 1: record the €10 charge.
    let payment = Payment::prescription_charge(Role::Patient);
    if let Err(e) = effects.stage_payment(storage, payment) {
        tracing::warn!(
            "payment for prescription request {} rejected: {}",
            original_message_id,
            e
        );
        return Ok(defer(clinic, original_message_id));
    }

    // Step 2: the prescription note for the admin staff. Verification runs
    // before anything is written; its failures are caller errors, not
    // transient conditions.
    verify_for_prescription(clinic, original_message_id)?;
    let message = Message::prescription_request(original_message_id, &clinic.directory);
    if let Err(e) = effects.stage_message(storage, message) {
        tracing::warn!(
            "prescription message for request {} rejected: {}",
            original_message_id,
            e
        );
        return Ok(defer(clinic, original_message_id));
    }

    // Step 3: external debit. Unknown latency; the staged scope means no
    // local write is held open across this call.
    if !clinic.provider.debit(Role::Patient) {
        tracing::warn!(
            "payment provider declined debit for prescription request {}",
            original_message_id
        );
        return Ok(defer(clinic, original_message_id));
    }

    let touched_inboxes = effects.message_inboxes();
    if let Err(e) = effects.commit(storage) {
        tracing::warn!(
            "commit failed for prescription request {}: {}",
            original_message_id,
            e
        );
        return Ok(defer(clinic, original_message_id));
    }
    for inbox_id in touched_inboxes {
        messages::refresh_unread(clinic, &inbox_id);
    }

    Ok(SagaOutcome::Completed(SagaResult {
        reference: original_message_id.to_string(),
        notice: SUCCESS_NOTICE.to_string(),
    }))
}

fn verify_for_prescription(clinic: &Clinic, original_message_id: &str) -> Result<(), MessageError> {
    messages::verify_reply(clinic, original_message_id, Role::Patient)?;
    Ok(())
}

/// Schedule a full replay after the standard delay and report Deferred. The
/// reference always travels with the retry, whichever step failed.
fn defer(clinic: &Clinic, original_message_id: &str) -> SagaOutcome {
    let request = RetryRequest::after_standard_delay(original_message_id);
    if let Err(e) = clinic.retry_tx.try_send(request) {
        tracing::error!(
            "retry channel full, dropping prescription retry for {}: {}",
            original_message_id,
            e
        );
    }
    SagaOutcome::Deferred
}
