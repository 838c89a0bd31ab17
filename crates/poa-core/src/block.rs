use serde::{Deserialize, Serialize};

use crate::transaction::Transaction;
use crate::types::{Address, Hash256, TimestampSecs};

/// A block header plus its transaction list.
///
/// `hash` and `signature` are computed over [`BlockHeader::canonical_bytes`]
/// (the closed header field list from §3) and are not themselves part of
/// the canonical payload.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Block {
    pub number: u64,
    pub parent_hash: Hash256,
    pub timestamp: TimestampSecs,
    pub validator: Address,
    pub transactions: Vec<Transaction>,
    pub transactions_root: Hash256,
    pub state_root: Hash256,
    pub receipts_root: Hash256,
    pub gas_limit: u64,
    pub gas_used: u64,
    #[serde(with = "crate::encoding::hex_bytes")]
    pub extra_data: Vec<u8>,
    pub hash: Hash256,
    /// 65-byte recoverable ECDSA signature (r || s || recovery_id).
    #[serde(with = "crate::encoding::hex_bytes")]
    pub signature: Vec<u8>,
}

impl Block {
    pub fn header(&self) -> BlockHeader {
        BlockHeader {
            number: self.number,
            parent_hash: self.parent_hash,
            timestamp: self.timestamp,
            validator: self.validator,
            transactions_root: self.transactions_root,
            state_root: self.state_root,
            receipts_root: self.receipts_root,
            gas_limit: self.gas_limit,
            gas_used: self.gas_used,
            extra_data: self.extra_data.clone(),
        }
    }

    pub fn tx_hashes(&self) -> Vec<Hash256> {
        self.transactions.iter().map(|t| t.hash).collect()
    }
}

/// The canonical, hashed/signed header — the exact, closed field list from
/// §3. `transactions` itself is not part of the header; it is committed to
/// via `transactions_root`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BlockHeader {
    pub number: u64,
    pub parent_hash: Hash256,
    pub timestamp: TimestampSecs,
    pub validator: Address,
    pub transactions_root: Hash256,
    pub state_root: Hash256,
    pub receipts_root: Hash256,
    pub gas_limit: u64,
    pub gas_used: u64,
    #[serde(with = "crate::encoding::hex_bytes")]
    pub extra_data: Vec<u8>,
}
