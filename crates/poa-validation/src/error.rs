use poa_core::types::{Address, Hash256};
use thiserror::Error;

/// The §7 error taxonomy for the data-model layer. `validateTransaction`
/// and `validateBlock` return the *first* failing check; earlier checks
/// have no side effects.
#[derive(Debug, Error)]
pub enum ValidationError {
    // ── StructuralError ──────────────────────────────────────────────────
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("transaction exceeds max data size: {len} > {max}")]
    DataTooLarge { len: usize, max: usize },

    #[error("encoded block size {size} exceeds max block size {max}")]
    BlockTooLarge { size: usize, max: usize },

    #[error("block has {count} transactions, exceeds max {max}")]
    TooManyTransactions { count: usize, max: usize },

    // ── CryptographicError ───────────────────────────────────────────────
    #[error("hash mismatch: expected {expected}, computed {computed}")]
    HashMismatch { expected: Hash256, computed: Hash256 },

    #[error("signature verification failed: {0}")]
    InvalidSignature(String),

    #[error("recovered address {recovered} does not match claimed {claimed}")]
    AddressMismatch { claimed: Address, recovered: Address },

    #[error("transactions root mismatch: expected {expected}, computed {computed}")]
    MerkleMismatch { expected: Hash256, computed: Hash256 },

    // ── SemanticError ────────────────────────────────────────────────────
    #[error("insufficient balance: need {need}, have {have}")]
    InsufficientBalance { need: String, have: String },

    #[error("nonce mismatch: expected {expected}, got {got}")]
    NonceMismatch { expected: u64, got: u64 },

    #[error("self-transfer not allowed: {0}")]
    SelfTransfer(Address),

    #[error("zero-value transfer must carry data")]
    ZeroValueNoData,

    #[error("unknown sender account: {0}")]
    UnknownSender(Address),

    #[error("unknown recipient account: {0}")]
    UnknownRecipient(Address),

    // ── PolicyError ──────────────────────────────────────────────────────
    #[error("gas price {price} outside allowed range [{min}, {max}]")]
    GasPriceOutOfRange { price: String, min: String, max: String },

    #[error("gas limit {limit} outside allowed range [{min}, {max}]")]
    GasLimitOutOfRange { limit: u64, min: u64, max: u64 },

    #[error("value {0} exceeds the 256-bit range")]
    ValueOutOfRange(String),

    #[error("replay detected: (from={from}, nonce={nonce}) already processed")]
    ReplayDetected { from: Address, nonce: u64 },

    #[error("duplicate transaction hash within block: {0}")]
    DuplicateTransaction(Hash256),

    // ── ChainError ───────────────────────────────────────────────────────
    #[error("block {got} does not link to parent: expected parentHash {expected_hash}, number {expected_number}")]
    NonLinkingParent {
        expected_hash: Hash256,
        expected_number: u64,
        got: u64,
    },

    #[error("block timestamp {timestamp} outside allowed band (> parent {parent_timestamp}, <= {max})")]
    TimestampOutOfBand {
        timestamp: i64,
        parent_timestamp: i64,
        max: i64,
    },

    #[error("gas used mismatch: declared {declared}, computed {computed}")]
    GasUsedMismatch { declared: u64, computed: u64 },
}
