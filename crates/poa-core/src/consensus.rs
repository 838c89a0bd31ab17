use serde::{Deserialize, Serialize};

use crate::block::Block;
use crate::types::{Address, Hash256, TimestampMs};

/// Phase of a single consensus round (§3, §4.5).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundPhase {
    Proposal,
    Voting,
    Commit,
    Recovery,
}

/// Terminal/in-flight status of a round.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundStatus {
    Pending,
    Success,
    Failed,
    Timeout,
}

/// A single signed vote on a proposed block.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Vote {
    pub validator: Address,
    pub block_hash: Hash256,
    pub decision: bool,
    pub round_number: u64,
    pub timestamp: TimestampMs,
    /// Recoverable ECDSA signature over `(block_hash || round_number ||
    /// decision)`.
    #[serde(with = "crate::encoding::hex_bytes")]
    pub signature: Vec<u8>,
}

impl Vote {
    /// The exact bytes the signature covers: `blockHash || roundNumber ||
    /// decision`.
    pub fn signing_bytes(
        block_hash: &Hash256,
        round_number: u64,
        decision: bool,
    ) -> Vec<u8> {
        let mut buf = Vec::with_capacity(32 + 8 + 1);
        buf.extend_from_slice(block_hash.as_bytes());
        buf.extend_from_slice(&round_number.to_be_bytes());
        buf.push(decision as u8);
        buf
    }
}

/// The state of one consensus round.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConsensusRound {
    pub round_number: u64,
    pub phase: RoundPhase,
    pub proposer: Address,
    pub start_time: TimestampMs,
    pub deadline: TimestampMs,
    pub proposed_block: Option<Block>,
    pub votes: Vec<Vote>,
    pub status: RoundStatus,
}

/// A periodic, signed snapshot used as a safe rewind target for recovery.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Checkpoint {
    pub block_number: u64,
    pub block_hash: Hash256,
    pub validator_set: Vec<Address>,
    pub state_digest: Hash256,
    #[serde(with = "sig_vec")]
    pub signatures: Vec<Vec<u8>>,
}

mod sig_vec {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(sigs: &[Vec<u8>], s: S) -> Result<S::Ok, S::Error> {
        let hexed: Vec<String> = sigs.iter().map(|b| format!("0x{}", hex::encode(b))).collect();
        hexed.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Vec<u8>>, D::Error> {
        let hexed = Vec::<String>::deserialize(d)?;
        hexed
            .into_iter()
            .map(|s| {
                let s = s.strip_prefix("0x").unwrap_or(&s).to_string();
                hex::decode(s).map_err(serde::de::Error::custom)
            })
            .collect()
    }
}
