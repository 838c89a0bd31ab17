use poa_core::types::{Address, Hash256};
use poa_validation::ValidationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MempoolError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("transaction {0} is blacklisted")]
    Blacklisted(Hash256),

    #[error("duplicate transaction hash: {0}")]
    Duplicate(Hash256),

    #[error("account {address} already has {count} pending transactions (limit {limit})")]
    AccountLimitReached { address: Address, count: usize, limit: usize },

    #[error("nonce {got} is below expected nonce {expected} for {address}")]
    NonceTooLow { address: Address, expected: u64, got: u64 },
}
