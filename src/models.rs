use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The fixed €10 charge for re-issuing a lost prescription, in cents.
pub const PRESCRIPTION_CHARGE_CENTS: i64 = 1_000;

// ── Actors ───────────────────────────────────────────────────────────────────
// Three fixed roles, not a user registry. The patient is "the current user"
// of the request; doctor and admin are the practice's singleton staff actors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Patient,
    Doctor,
    Admin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Patient, Role::Doctor, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Patient => "patient",
            Role::Doctor => "doctor",
            Role::Admin => "admin",
        }
    }
}

// ── Mailbox Directory ────────────────────────────────────────────────────────
// Resolves each fixed actor to its inbox/outbox identity. Identities are
// derived, not stored, so every process agrees on them without a registry.
// Injected into the operations that need it rather than reached for as a
// global.
#[derive(Debug, Clone, Copy, Default)]
pub struct MailboxDirectory;

impl MailboxDirectory {
    pub fn inbox_of(&self, role: Role) -> String {
        mailbox_id("ibx", "inbox", role)
    }

    pub fn outbox_of(&self, role: Role) -> String {
        mailbox_id("obx", "outbox", role)
    }

    /// Reverse lookup: which actor owns this inbox, if any.
    pub fn owner_of_inbox(&self, inbox_id: &str) -> Option<Role> {
        Role::ALL.iter().copied().find(|r| self.inbox_of(*r) == inbox_id)
    }
}

fn mailbox_id(prefix: &str, kind: &str, role: Role) -> String {
    let name = format!("{}.{}.medpost", role.as_str(), kind);
    format!(
        "{}_{}",
        prefix,
        Uuid::new_v5(&Uuid::NAMESPACE_DNS, name.as_bytes()).simple()
    )
}

// ── Records ──────────────────────────────────────────────────────────────────
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Message {
    pub id: String,
    pub body: String,
    pub inbox_id: String,
    pub outbox_id: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(body: &str, inbox_id: String, outbox_id: String) -> Self {
        Message {
            id: Uuid::new_v4().to_string(),
            body: body.to_string(),
            inbox_id,
            outbox_id,
            read: false,
            created_at: Utc::now(),
        }
    }

    /// The fixed-template note a patient sends to the admin staff when asking
    /// for a prescription re-issue. The original message reference is embedded
    /// in the body; it is not a persisted foreign key.
    pub fn prescription_request(original_message_id: &str, directory: &MailboxDirectory) -> Self {
        let body = format!(
            "I've lost my script, please issue a new one at a charge of €10. Message: {}",
            original_message_id
        );
        Message::new(
            &body,
            directory.inbox_of(Role::Admin),
            directory.outbox_of(Role::Patient),
        )
    }
}

// Only the doctor's inbox carries an unread count; the others leave it unset.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Inbox {
    pub id: String,
    pub owner: Role,
    pub unread_count: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Payment {
    pub id: String,
    pub payer: Role,
    pub amount_cents: i64,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    pub fn prescription_charge(payer: Role) -> Self {
        Payment {
            id: Uuid::new_v4().to_string(),
            payer,
            amount_cents: PRESCRIPTION_CHARGE_CENTS,
            created_at: Utc::now(),
        }
    }
}
