use std::collections::BTreeMap;
use std::path::Path;

use poa_core::account::AccountState;
use poa_core::block::Block;
use poa_core::config::NodeConfig;
use poa_core::consensus::Checkpoint;
use poa_core::types::{Address, Hash256, TimestampSecs};
use poa_validation::{validate_block_header, validate_genesis_header, validate_transaction, AccountStateView};

use crate::db::StateDb;
use crate::error::LedgerError;

/// The ledger state machine (§4.3 "Ledger state"): genesis init, the
/// account map, block index, `addBlock`, and chain-wide integrity checks.
///
/// Readers see committed state through ordinary sled reads (copy-on-apply:
/// `addBlock` commits the whole batch or none of it), so no external
/// locking is required for the single-writer model described in §5.
pub struct LedgerEngine {
    db: StateDb,
}

impl LedgerEngine {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, LedgerError> {
        Ok(Self { db: StateDb::open(path)? })
    }

    pub fn is_initialized(&self) -> bool {
        self.db.get_meta("genesis_hash").ok().flatten().is_some()
    }

    /// Synthesizes block 0 from a genesis allocation and a pre-built
    /// genesis block (constructed by `poa-genesis`, which owns the
    /// `Genesis` description itself — this crate only needs the resulting
    /// block and account map).
    pub fn init_genesis(
        &self,
        genesis_block: Block,
        alloc: BTreeMap<Address, AccountState>,
    ) -> Result<(), LedgerError> {
        if self.is_initialized() {
            return Err(LedgerError::AlreadyInitialized);
        }
        validate_genesis_header(&genesis_block)?;
        if genesis_block.number != 0 {
            return Err(LedgerError::Chain("genesis block must be number 0".into()));
        }

        for (address, state) in &alloc {
            self.db.put_account(address, state)?;
        }
        self.db.put_block(&genesis_block)?;
        self.db.put_meta("genesis_hash", genesis_block.hash.as_bytes())?;
        self.db.put_meta("latest_number", &genesis_block.number.to_be_bytes())?;
        self.db.flush()?;
        Ok(())
    }

    pub fn latest(&self) -> Result<Block, LedgerError> {
        let bytes = self
            .db
            .get_meta("latest_number")?
            .ok_or(LedgerError::NotInitialized)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(&bytes);
        let number = u64::from_be_bytes(arr);
        self.db
            .get_block_by_number(number)?
            .ok_or_else(|| LedgerError::Fatal(format!("latest_number {number} points at a missing block")))
    }

    pub fn block_by_number(&self, number: u64) -> Result<Option<Block>, LedgerError> {
        self.db.get_block_by_number(number)
    }

    pub fn block_by_hash(&self, hash: &Hash256) -> Result<Option<Block>, LedgerError> {
        self.db.get_block_by_hash(hash)
    }

    pub fn account(&self, address: &Address) -> Result<Option<AccountState>, LedgerError> {
        self.db.get_account(address)
    }

    pub fn block_count(&self) -> u64 {
        self.db.block_count()
    }

    /// `addBlock(block) → Result` (§4.3), executed as one logical, atomic
    /// step: every write lands only if every check upstream of it passed.
    pub fn add_block(&self, block: Block, cfg: &NodeConfig, now: TimestampSecs) -> Result<(), LedgerError> {
        let parent = self.latest()?;

        if block.number <= parent.number && self.db.get_block_by_number(block.number)?.is_some() {
            return Err(LedgerError::Chain(format!(
                "block {} already committed",
                block.number
            )));
        }

        // 1-3: structural/size, chain continuity, crypto.
        validate_block_header(&block, &parent, cfg, now)?;

        // 4-5: validate + apply each transaction sequentially against a
        // scratch copy of account state; gasUsed must match the sum of
        // gasLimit across the block's transactions.
        let mut scratch = ScratchView::new(&self.db);
        let mut gas_used = 0u64;
        for tx in &block.transactions {
            validate_transaction(tx, &scratch, cfg, tx.timestamp)?;
            apply_transaction(&mut scratch, tx, &block.validator);
            scratch.mark_processed(tx.from, tx.nonce);
            gas_used += tx.gas_limit;
        }
        if gas_used != block.gas_used {
            return Err(LedgerError::Chain(format!(
                "gasUsed mismatch: declared {}, computed {gas_used}",
                block.gas_used
            )));
        }

        // 6. Commit: publish the new state atomically.
        for (address, state) in scratch.dirty {
            self.db.put_account(&address, &state)?;
        }
        for (address, nonce) in scratch.newly_processed {
            self.db.mark_processed(&address, nonce)?;
        }
        self.db.put_block(&block)?;
        self.db.put_meta("latest_number", &block.number.to_be_bytes())?;
        self.db.flush()?;

        if block.number > 0 && block.number % cfg.checkpoint_interval == 0 {
            tracing::info!(number = block.number, "checkpoint interval reached");
        }

        Ok(())
    }

    /// Whether the current head is due for a checkpoint. Signatures over
    /// the checkpoint are gathered by the consensus layer and attached via
    /// [`LedgerEngine::store_checkpoint`].
    pub fn checkpoint_due(&self, cfg: &NodeConfig) -> Result<bool, LedgerError> {
        let head = self.latest()?;
        Ok(head.number > 0 && head.number % cfg.checkpoint_interval == 0)
    }

    pub fn store_checkpoint(&self, checkpoint: Checkpoint) -> Result<(), LedgerError> {
        self.db.put_checkpoint(&checkpoint)
    }

    pub fn checkpoint(&self, block_number: u64) -> Result<Option<Checkpoint>, LedgerError> {
        self.db.get_checkpoint(block_number)
    }

    pub fn latest_checkpoint(&self) -> Result<Option<Checkpoint>, LedgerError> {
        self.db.latest_checkpoint()
    }

    /// A digest of the full account map, for `Checkpoint::state_digest`.
    /// Accounts are sorted by address so the digest is order-independent.
    pub fn state_digest(&self) -> Result<Hash256, LedgerError> {
        let accounts = self.db.iter_accounts()?;
        let canonical = poa_crypto::canonical_bytes(&accounts)
            .map_err(|e| LedgerError::Serialization(e.to_string()))?;
        Ok(poa_crypto::hash(&canonical))
    }

    /// `validateChain()` — idempotent; re-checks every committed block
    /// against §3's invariants (§8 "Round-trip/idempotence").
    pub fn validate_chain(&self, cfg: &NodeConfig) -> Result<bool, LedgerError> {
        let head = self.latest()?;
        let mut parent = self.block_by_number(0)?.ok_or(LedgerError::NotInitialized)?;
        validate_genesis_header(&parent)?;
        for number in 1..=head.number {
            let block = self
                .block_by_number(number)?
                .ok_or_else(|| LedgerError::Fatal(format!("missing block {number} below head")))?;
            if validate_block_header(&block, &parent, cfg, block.timestamp).is_err() {
                return Ok(false);
            }
            parent = block;
        }
        Ok(true)
    }

    /// Exports `[from, to]` inclusive, for checkpoint-based recovery sync.
    pub fn export_range(&self, from: u64, to: u64) -> Result<Vec<Block>, LedgerError> {
        let mut out = Vec::new();
        for number in from..=to {
            match self.db.get_block_by_number(number)? {
                Some(block) => out.push(block),
                None => break,
            }
        }
        Ok(out)
    }

    /// Imports a contiguous range of already-final blocks received from a
    /// peer during recovery sync, re-validating each one.
    pub fn import_range(&self, blocks: Vec<Block>, cfg: &NodeConfig, now: TimestampSecs) -> Result<(), LedgerError> {
        for block in blocks {
            self.add_block(block, cfg, now)?;
        }
        Ok(())
    }
}

impl AccountStateView for LedgerEngine {
    fn account(&self, address: &Address) -> Option<AccountState> {
        self.db.get_account(address).ok().flatten()
    }

    fn is_processed(&self, from: &Address, nonce: u64) -> bool {
        self.db.is_processed(from, nonce)
    }
}

/// A read-through, copy-on-write view over [`StateDb`] used while applying
/// one block's transactions. Nothing here is written to disk until
/// [`LedgerEngine::add_block`] commits.
struct ScratchView<'a> {
    db: &'a StateDb,
    dirty: BTreeMap<Address, AccountState>,
    newly_processed: Vec<(Address, u64)>,
}

impl<'a> ScratchView<'a> {
    fn new(db: &'a StateDb) -> Self {
        Self {
            db,
            dirty: BTreeMap::new(),
            newly_processed: Vec::new(),
        }
    }

    fn mark_processed(&mut self, address: Address, nonce: u64) {
        self.newly_processed.push((address, nonce));
    }
}

impl AccountStateView for ScratchView<'_> {
    fn account(&self, address: &Address) -> Option<AccountState> {
        if let Some(state) = self.dirty.get(address) {
            return Some(state.clone());
        }
        self.db.get_account(address).ok().flatten()
    }

    fn is_processed(&self, from: &Address, nonce: u64) -> bool {
        self.newly_processed.contains(&(*from, nonce)) || self.db.is_processed(from, nonce)
    }
}

fn apply_transaction(scratch: &mut ScratchView<'_>, tx: &poa_core::transaction::Transaction, validator: &Address) {
    let fee = tx
        .gas_price
        .checked_mul(poa_core::types::Amount::from_u64(tx.gas_limit))
        .expect("fee was bounds-checked by validate_transaction");

    let mut sender = scratch
        .account(&tx.from)
        .expect("sender existence was checked by validate_transaction");
    sender.balance = sender
        .balance
        .checked_sub(tx.value)
        .and_then(|b| b.checked_sub(fee))
        .expect("balance sufficiency was checked by validate_transaction");
    sender.nonce += 1;
    scratch.dirty.insert(tx.from, sender);

    let mut recipient = scratch
        .account(&tx.to)
        .expect("recipient existence was checked by validate_transaction");
    recipient.balance = recipient
        .balance
        .checked_add(tx.value)
        .expect("value was bounds-checked by validate_transaction");
    scratch.dirty.insert(tx.to, recipient);

    let mut validator_state = scratch.account(validator).unwrap_or_default();
    validator_state.balance = validator_state
        .balance
        .checked_add(fee)
        .expect("total supply is conserved: fee came out of sender's balance");
    scratch.dirty.insert(*validator, validator_state);
}

#[cfg(test)]
mod tests {
    use super::*;
    use poa_core::transaction::Transaction;
    use poa_core::types::Amount;
    use poa_crypto::{canonical_bytes, hash, merkle_root, KeyPair};

    fn genesis_block(validator: &Address, timestamp: i64) -> Block {
        let mut block = Block {
            number: 0,
            parent_hash: Hash256::ZERO,
            timestamp,
            validator: *validator,
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
        let header = block.header();
        let canonical = canonical_bytes(&header).unwrap();
        block.hash = hash(&canonical);
        block.signature = vec![0u8; 65];
        block
    }

    #[test]
    fn genesis_initializes_and_reports_latest() {
        let dir = tempdir();
        let engine = LedgerEngine::open(dir.path()).unwrap();
        assert!(!engine.is_initialized());

        let system_validator = Address::ZERO;
        let genesis = genesis_block(&system_validator, 1_700_000_000);
        let mut alloc = BTreeMap::new();
        alloc.insert(
            Address::from_bytes([1u8; 20]),
            AccountState::new(Amount::from_u64(1_000_000)),
        );
        engine.init_genesis(genesis.clone(), alloc).unwrap();

        assert!(engine.is_initialized());
        assert_eq!(engine.latest().unwrap().number, 0);
        assert_eq!(engine.block_count(), 1);
    }

    #[test]
    fn add_block_applies_transfer_and_advances_nonce() {
        let dir = tempdir();
        let engine = LedgerEngine::open(dir.path()).unwrap();
        let validator_kp = KeyPair::generate();
        let genesis = genesis_block(&validator_kp.address, 1_700_000_000);

        let sender_kp = KeyPair::generate();
        let recipient = KeyPair::generate().address;
        let mut alloc = BTreeMap::new();
        alloc.insert(sender_kp.address, AccountState::new(Amount::from_u64(1_000_000)));
        alloc.insert(recipient, AccountState::new(Amount::ZERO));
        alloc.insert(validator_kp.address, AccountState::new(Amount::ZERO));
        engine.init_genesis(genesis.clone(), alloc).unwrap();

        let mut tx = Transaction {
            from: sender_kp.address,
            to: recipient,
            value: Amount::from_u64(100),
            data: Vec::new(),
            nonce: 0,
            gas_limit: 21_000,
            gas_price: Amount::from_u64(1),
            timestamp: 1_700_000_005_000,
            signature: Vec::new(),
            hash: Hash256::ZERO,
        };
        let tx_body = tx.body();
        let tx_canonical = canonical_bytes(&tx_body).unwrap();
        tx.hash = hash(&tx_canonical);
        tx.signature = sender_kp.sign(&tx_canonical);

        let mut block = Block {
            number: 1,
            parent_hash: genesis.hash,
            timestamp: 1_700_000_005,
            validator: validator_kp.address,
            transactions: vec![tx],
            transactions_root: Hash256::ZERO,
            state_root: Hash256::ZERO,
            receipts_root: Hash256::ZERO,
            gas_limit: 12_000_000,
            gas_used: 21_000,
            extra_data: Vec::new(),
            hash: Hash256::ZERO,
            signature: Vec::new(),
        };
        block.transactions_root = merkle_root(&block.tx_hashes());
        let header = block.header();
        let canonical = canonical_bytes(&header).unwrap();
        block.hash = hash(&canonical);
        block.signature = validator_kp.sign(&canonical);

        let cfg = NodeConfig::default();
        engine.add_block(block, &cfg, 1_700_000_010).unwrap();

        let sender_state = engine.account(&sender_kp.address).unwrap().unwrap();
        assert_eq!(sender_state.nonce, 1);
        assert_eq!(sender_state.balance, Amount::from_u64(1_000_000 - 100 - 21_000));
        let recipient_state = engine.account(&recipient).unwrap().unwrap();
        assert_eq!(recipient_state.balance, Amount::from_u64(100));
    }

    fn tempdir() -> tempfile::TempDir {
        tempfile::tempdir().unwrap()
    }
}
