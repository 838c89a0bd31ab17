use poa_core::account::AccountState;
use poa_core::types::{Address, Nonce};

/// A read-only view of account state, as seen by the validation pipeline.
/// Implemented by `poa-ledger`'s state engine over a specific block height,
/// and by test doubles in this crate's own tests.
pub trait AccountStateView {
    fn account(&self, address: &Address) -> Option<AccountState>;

    /// Whether `(from, nonce)` has already been committed — the replay
    /// guard checked at step 8 of `validateTransaction`.
    fn is_processed(&self, from: &Address, nonce: Nonce) -> bool;
}
