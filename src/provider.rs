use crate::models::Role;

// ── Payment gateway boundary ─────────────────────────────────────────────────
// The saga only needs a yes/no debit of the payer's card on file. Latency is
// unknown from the caller's side; idempotency per logical request is assumed
// of the provider, not enforced here.
pub trait PaymentProvider: Send + Sync {
    fn debit(&self, payer: Role) -> bool;
}

/// Stand-in card provider used outside of tests: approves every charge and
/// logs the debit, which is enough to exercise the saga end to end.
#[derive(Debug, Default)]
pub struct CardProvider;

impl PaymentProvider for CardProvider {
    fn debit(&self, payer: Role) -> bool {
        tracing::info!("debiting card on file for {}", payer.as_str());
        true
    }
}
