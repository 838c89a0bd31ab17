use poa_core::block::Block;
use poa_core::config::NodeConfig;
use poa_core::constants::BLOCK_TIMESTAMP_FUTURE_SECS;
use poa_core::types::{Hash256, TimestampSecs};
use poa_crypto::{canonical_bytes, hash, merkle_root, verify_bound};

use crate::error::ValidationError;

/// `validateBlock(block, parent, stateView)` minus the state-transition
/// simulation (§4.2): recomputes `hash`/`transactionsRoot`, verifies the
/// validator signature, and checks chain linkage, the timestamp band, and
/// block-level structural limits. Applying transactions and checking the
/// resulting `gasUsed` is `poa-ledger`'s `addBlock` step 5, since it needs
/// a mutable scratch copy of account state that this crate does not own.
pub fn validate_block_header(
    block: &Block,
    parent: &Block,
    cfg: &NodeConfig,
    now: TimestampSecs,
) -> Result<(), ValidationError> {
    // 1. Structural + size validation.
    let encoded = serde_json::to_vec(block).map_err(|e| ValidationError::InvalidSignature(e.to_string()))?;
    if encoded.len() > cfg.max_block_size_bytes {
        return Err(ValidationError::BlockTooLarge {
            size: encoded.len(),
            max: cfg.max_block_size_bytes,
        });
    }
    if block.transactions.len() > cfg.max_transactions_per_block {
        return Err(ValidationError::TooManyTransactions {
            count: block.transactions.len(),
            max: cfg.max_transactions_per_block,
        });
    }

    // 2. Chain continuity.
    if block.parent_hash != parent.hash || block.number != parent.number + 1 {
        return Err(ValidationError::NonLinkingParent {
            expected_hash: parent.hash,
            expected_number: parent.number + 1,
            got: block.number,
        });
    }
    if block.timestamp <= parent.timestamp || block.timestamp > now + BLOCK_TIMESTAMP_FUTURE_SECS {
        return Err(ValidationError::TimestampOutOfBand {
            timestamp: block.timestamp,
            parent_timestamp: parent.timestamp,
            max: now + BLOCK_TIMESTAMP_FUTURE_SECS,
        });
    }

    // 3. Cryptographic: recompute hash, verify signature, verify Merkle root.
    let header = block.header();
    let canonical = canonical_bytes(&header).map_err(|e| ValidationError::InvalidSignature(e.to_string()))?;
    let computed_hash = hash(&canonical);
    if computed_hash != block.hash {
        return Err(ValidationError::HashMismatch {
            expected: block.hash,
            computed: computed_hash,
        });
    }
    verify_bound(&canonical, &block.signature, &block.validator)
        .map_err(|e| ValidationError::InvalidSignature(e.to_string()))?;

    let tx_hashes = block.tx_hashes();
    let computed_root = merkle_root(&tx_hashes);
    if computed_root != block.transactions_root {
        return Err(ValidationError::MerkleMismatch {
            expected: block.transactions_root,
            computed: computed_root,
        });
    }

    // 4. Duplicate transaction hashes within the block.
    let mut seen = std::collections::HashSet::with_capacity(tx_hashes.len());
    for h in &tx_hashes {
        if !seen.insert(*h) {
            return Err(ValidationError::DuplicateTransaction(*h));
        }
    }

    Ok(())
}

/// Validates the genesis block in isolation: no parent, and the hash/
/// signature/merkle checks still apply.
pub fn validate_genesis_header(block: &Block) -> Result<(), ValidationError> {
    let header = block.header();
    let canonical = canonical_bytes(&header).map_err(|e| ValidationError::InvalidSignature(e.to_string()))?;
    let computed_hash = hash(&canonical);
    if computed_hash != block.hash {
        return Err(ValidationError::HashMismatch {
            expected: block.hash,
            computed: computed_hash,
        });
    }
    let tx_hashes = block.tx_hashes();
    let computed_root = merkle_root(&tx_hashes);
    if computed_root != block.transactions_root {
        return Err(ValidationError::MerkleMismatch {
            expected: block.transactions_root,
            computed: computed_root,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use poa_core::block::Block;
    use poa_crypto::KeyPair;

    fn signed_block(kp: &KeyPair, number: u64, parent_hash: Hash256, timestamp: i64) -> Block {
        let mut block = Block {
            number,
            parent_hash,
            timestamp,
            validator: kp.address,
            transactions: Vec::new(),
            transactions_root: Hash256::ZERO,
            state_root: Hash256::ZERO,
            receipts_root: Hash256::ZERO,
            gas_limit: 12_000_000,
            gas_used: 0,
            extra_data: Vec::new(),
            hash: Hash256::ZERO,
            signature: Vec::new(),
        };
        block.transactions_root = merkle_root(&block.tx_hashes());
        let header = block.header();
        let canonical = canonical_bytes(&header).unwrap();
        block.hash = hash(&canonical);
        block.signature = kp.sign(&canonical);
        block
    }

    #[test]
    fn valid_block_links_to_parent() {
        let kp = KeyPair::generate();
        let genesis = signed_block(&kp, 0, Hash256::ZERO, 1_700_000_000);
        let block = signed_block(&kp, 1, genesis.hash, 1_700_000_005);
        let cfg = NodeConfig::default();
        assert!(validate_block_header(&block, &genesis, &cfg, 1_700_000_010).is_ok());
    }

    #[test]
    fn wrong_parent_hash_is_rejected() {
        let kp = KeyPair::generate();
        let genesis = signed_block(&kp, 0, Hash256::ZERO, 1_700_000_000);
        let mut block = signed_block(&kp, 1, genesis.hash, 1_700_000_005);
        block.parent_hash = Hash256::from_bytes([9u8; 32]);
        let cfg = NodeConfig::default();
        assert!(matches!(
            validate_block_header(&block, &genesis, &cfg, 1_700_000_010),
            Err(ValidationError::NonLinkingParent { .. })
        ));
    }

    #[test]
    fn stale_timestamp_is_rejected() {
        let kp = KeyPair::generate();
        let genesis = signed_block(&kp, 0, Hash256::ZERO, 1_700_000_000);
        let block = signed_block(&kp, 1, genesis.hash, 1_700_000_000);
        let cfg = NodeConfig::default();
        assert!(matches!(
            validate_block_header(&block, &genesis, &cfg, 1_700_000_010),
            Err(ValidationError::TimestampOutOfBand { .. })
        ));
    }
}
