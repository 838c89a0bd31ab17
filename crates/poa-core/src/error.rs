use thiserror::Error;

use crate::types::{Hash256, ParseAmountError};

/// Errors shared by the data-model layer: malformed wire values that don't
/// belong to any one pipeline stage (validation/ledger/mempool/consensus
/// each carry their own, narrower, error enum — see §7).
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid hash256 length: expected 32 bytes, got {0}")]
    InvalidHashLength(usize),

    #[error("invalid address length: expected 20 bytes, got {0}")]
    InvalidAddressLength(usize),

    #[error("invalid hex encoding: {0}")]
    InvalidHex(String),

    #[error(transparent)]
    InvalidAmount(#[from] ParseAmountError),

    #[error("block {number} references unknown parent {parent_hash}")]
    UnknownParent { number: u64, parent_hash: Hash256 },

    #[error("serialization error: {0}")]
    Serialization(String),
}
