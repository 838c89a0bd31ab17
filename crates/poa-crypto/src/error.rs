use poa_core::types::Address;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("invalid signature length: expected 65 bytes, got {0}")]
    InvalidSignatureLength(usize),

    #[error("recovered address {recovered} does not match expected {expected}")]
    AddressMismatch { expected: Address, recovered: Address },

    #[error("canonical encoding error: {0}")]
    Canonical(String),
}
