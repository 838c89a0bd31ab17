use poa_core::types::{Address, Hash256};
use poa_validation::ValidationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// `ChainError` — non-linking parent, replay of an already-committed
    /// block, gas-used mismatch caught at the apply stage.
    #[error("chain error: {0}")]
    Chain(String),

    /// State integrity violation discovered after commit — halts the node
    /// (§7 `FatalError`).
    #[error("fatal: ledger state integrity violation: {0}")]
    Fatal(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("unknown block: {0}")]
    UnknownBlock(Hash256),

    #[error("unknown account: {0}")]
    UnknownAccount(Address),

    #[error("ledger already initialized with a genesis block")]
    AlreadyInitialized,

    #[error("ledger has not been initialized with a genesis block")]
    NotInitialized,
}
