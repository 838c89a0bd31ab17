use poa_ledger::LedgerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenesisError {
    #[error("failed to read genesis file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed genesis file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid address {0:?} in genesis alloc")]
    InvalidAddress(String),

    #[error("invalid amount {0:?} in genesis alloc")]
    InvalidAmount(String),

    #[error("invalid hex value {0:?} in genesis file")]
    InvalidHex(String),

    #[error("gasLimit {0} does not fit in a u64")]
    GasLimitOverflow(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}
