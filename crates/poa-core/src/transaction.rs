use serde::{Deserialize, Serialize};

use crate::types::{Address, Amount, Hash256, Nonce, TimestampMs};

/// A fully-formed, signed transaction.
///
/// `hash` and `signature` are computed over [`TransactionBody::canonical_bytes`]
/// and are not themselves part of the canonical payload (see §4.1: "Any
/// change to canonical encoding breaks consensus").
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub from: Address,
    pub to: Address,
    pub value: Amount,
    #[serde(with = "crate::encoding::hex_bytes")]
    pub data: Vec<u8>,
    pub nonce: Nonce,
    pub gas_limit: u64,
    pub gas_price: Amount,
    pub timestamp: TimestampMs,
    /// 65-byte recoverable ECDSA signature (r || s || recovery_id).
    #[serde(with = "crate::encoding::hex_bytes")]
    pub signature: Vec<u8>,
    pub hash: Hash256,
}

impl Transaction {
    /// The fields covered by `hash` and `signature`: everything except
    /// `signature` and `hash` themselves.
    pub fn body(&self) -> TransactionBody {
        TransactionBody {
            from: self.from,
            to: self.to,
            value: self.value,
            data: self.data.clone(),
            nonce: self.nonce,
            gas_limit: self.gas_limit,
            gas_price: self.gas_price,
            timestamp: self.timestamp,
        }
    }

    /// Estimated gas cost used by mempool selection: `21000 + 68 * |data|`.
    pub fn estimated_gas(&self) -> u64 {
        21_000 + 68 * self.data.len() as u64
    }

    /// The fee component (`gasLimit * gasPrice`), used for balance checks.
    pub fn max_fee(&self) -> Option<Amount> {
        self.gas_price.checked_mul(Amount::from_u64(self.gas_limit))
    }
}

/// The canonical, hashed/signed body of a transaction — the exact, closed
/// field list from §3.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TransactionBody {
    pub from: Address,
    pub to: Address,
    pub value: Amount,
    #[serde(with = "crate::encoding::hex_bytes")]
    pub data: Vec<u8>,
    pub nonce: Nonce,
    pub gas_limit: u64,
    pub gas_price: Amount,
    pub timestamp: TimestampMs,
}
