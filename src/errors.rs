use thiserror::Error;

// ── Storage failures ─────────────────────────────────────────────────────────
#[derive(Debug, Error)]
pub enum StorageError {
    /// The record violates a write-validation rule and will never be accepted.
    #[error("invalid record: {0}")]
    Invalid(String),

    /// The store refused the write for a transient reason.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

// ── Messaging failures ───────────────────────────────────────────────────────
// ReferenceMissing, NotFound and HackAttempt indicate caller error (or abuse)
// and always surface synchronously — they are never retried. SaveRejected is
// the transient local-storage failure; in the reply path it surfaces to the
// caller, in the saga it is converted into a deferred retry instead.
#[derive(Debug, Error)]
pub enum MessageError {
    #[error("original message reference is missing")]
    ReferenceMissing,

    #[error("message {0} not found")]
    NotFound(String),

    #[error("hack attempt: reply does not belong to the sender's conversation")]
    HackAttempt,

    #[error("message could not be stored: {0}")]
    SaveRejected(#[from] StorageError),
}
