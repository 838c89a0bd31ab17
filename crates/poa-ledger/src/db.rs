use std::path::Path;

use poa_core::account::AccountState;
use poa_core::block::Block;
use poa_core::consensus::Checkpoint;
use poa_core::types::{Address, Hash256, Nonce};

use crate::error::LedgerError;

/// Sled-backed persistent ledger storage (§6 "Persisted state layout").
///
/// Named trees:
///   blocks            — block number be-bytes → bincode(Block)
///   block_hash_index   — block hash bytes      → block number be-bytes
///   accounts          — address bytes          → bincode(AccountState)
///   checkpoints        — checkpoint number be-bytes → bincode(Checkpoint)
///   processed_nonces   — address || nonce be-bytes  → `[]` (membership set)
///   meta              — utf8 key bytes          → raw bytes
pub struct StateDb {
    db: sled::Db,
    blocks: sled::Tree,
    block_hash_index: sled::Tree,
    accounts: sled::Tree,
    checkpoints: sled::Tree,
    processed_nonces: sled::Tree,
    meta: sled::Tree,
}

impl StateDb {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, LedgerError> {
        let db = sled::open(path).map_err(|e| LedgerError::Storage(e.to_string()))?;
        let blocks = db.open_tree("blocks").map_err(|e| LedgerError::Storage(e.to_string()))?;
        let block_hash_index = db
            .open_tree("block_hash_index")
            .map_err(|e| LedgerError::Storage(e.to_string()))?;
        let accounts = db.open_tree("accounts").map_err(|e| LedgerError::Storage(e.to_string()))?;
        let checkpoints = db
            .open_tree("checkpoints")
            .map_err(|e| LedgerError::Storage(e.to_string()))?;
        let processed_nonces = db
            .open_tree("processed_nonces")
            .map_err(|e| LedgerError::Storage(e.to_string()))?;
        let meta = db.open_tree("meta").map_err(|e| LedgerError::Storage(e.to_string()))?;
        Ok(Self {
            db,
            blocks,
            block_hash_index,
            accounts,
            checkpoints,
            processed_nonces,
            meta,
        })
    }

    // ── Blocks ───────────────────────────────────────────────────────────

    pub fn put_block(&self, block: &Block) -> Result<(), LedgerError> {
        let bytes = bincode::serialize(block).map_err(|e| LedgerError::Serialization(e.to_string()))?;
        self.blocks
            .insert(block.number.to_be_bytes(), bytes)
            .map_err(|e| LedgerError::Storage(e.to_string()))?;
        self.block_hash_index
            .insert(block.hash.as_bytes(), &block.number.to_be_bytes())
            .map_err(|e| LedgerError::Storage(e.to_string()))?;
        Ok(())
    }

    pub fn get_block_by_number(&self, number: u64) -> Result<Option<Block>, LedgerError> {
        match self
            .blocks
            .get(number.to_be_bytes())
            .map_err(|e| LedgerError::Storage(e.to_string()))?
        {
            Some(bytes) => Ok(Some(
                bincode::deserialize(&bytes).map_err(|e| LedgerError::Serialization(e.to_string()))?,
            )),
            None => Ok(None),
        }
    }

    pub fn get_block_by_hash(&self, hash: &Hash256) -> Result<Option<Block>, LedgerError> {
        match self
            .block_hash_index
            .get(hash.as_bytes())
            .map_err(|e| LedgerError::Storage(e.to_string()))?
        {
            Some(number_bytes) => {
                let mut arr = [0u8; 8];
                arr.copy_from_slice(&number_bytes);
                self.get_block_by_number(u64::from_be_bytes(arr))
            }
            None => Ok(None),
        }
    }

    pub fn block_count(&self) -> u64 {
        self.blocks.len() as u64
    }

    // ── Accounts ─────────────────────────────────────────────────────────

    pub fn get_account(&self, address: &Address) -> Result<Option<AccountState>, LedgerError> {
        match self
            .accounts
            .get(address.as_bytes())
            .map_err(|e| LedgerError::Storage(e.to_string()))?
        {
            Some(bytes) => Ok(Some(
                bincode::deserialize(&bytes).map_err(|e| LedgerError::Serialization(e.to_string()))?,
            )),
            None => Ok(None),
        }
    }

    pub fn put_account(&self, address: &Address, state: &AccountState) -> Result<(), LedgerError> {
        let bytes = bincode::serialize(state).map_err(|e| LedgerError::Serialization(e.to_string()))?;
        self.accounts
            .insert(address.as_bytes(), bytes)
            .map_err(|e| LedgerError::Storage(e.to_string()))?;
        Ok(())
    }

    pub fn account_count(&self) -> u64 {
        self.accounts.len() as u64
    }

    pub fn iter_accounts(&self) -> Result<Vec<(Address, AccountState)>, LedgerError> {
        let mut out = Vec::new();
        for item in self.accounts.iter() {
            let (key, bytes) = item.map_err(|e| LedgerError::Storage(e.to_string()))?;
            let mut arr = [0u8; 20];
            arr.copy_from_slice(&key);
            let state: AccountState =
                bincode::deserialize(&bytes).map_err(|e| LedgerError::Serialization(e.to_string()))?;
            out.push((Address::from_bytes(arr), state));
        }
        Ok(out)
    }

    // ── Replay guard ─────────────────────────────────────────────────────

    pub fn mark_processed(&self, address: &Address, nonce: Nonce) -> Result<(), LedgerError> {
        let key = processed_key(address, nonce);
        self.processed_nonces
            .insert(key, b"".as_ref())
            .map_err(|e| LedgerError::Storage(e.to_string()))?;
        Ok(())
    }

    pub fn is_processed(&self, address: &Address, nonce: Nonce) -> bool {
        self.processed_nonces
            .contains_key(processed_key(address, nonce))
            .unwrap_or(false)
    }

    // ── Checkpoints ──────────────────────────────────────────────────────

    pub fn put_checkpoint(&self, checkpoint: &Checkpoint) -> Result<(), LedgerError> {
        let bytes = bincode::serialize(checkpoint).map_err(|e| LedgerError::Serialization(e.to_string()))?;
        self.checkpoints
            .insert(checkpoint.block_number.to_be_bytes(), bytes)
            .map_err(|e| LedgerError::Storage(e.to_string()))?;
        Ok(())
    }

    pub fn get_checkpoint(&self, block_number: u64) -> Result<Option<Checkpoint>, LedgerError> {
        match self
            .checkpoints
            .get(block_number.to_be_bytes())
            .map_err(|e| LedgerError::Storage(e.to_string()))?
        {
            Some(bytes) => Ok(Some(
                bincode::deserialize(&bytes).map_err(|e| LedgerError::Serialization(e.to_string()))?,
            )),
            None => Ok(None),
        }
    }

    pub fn latest_checkpoint(&self) -> Result<Option<Checkpoint>, LedgerError> {
        match self.checkpoints.last().map_err(|e| LedgerError::Storage(e.to_string()))? {
            Some((_, bytes)) => Ok(Some(
                bincode::deserialize(&bytes).map_err(|e| LedgerError::Serialization(e.to_string()))?,
            )),
            None => Ok(None),
        }
    }

    // ── Meta ─────────────────────────────────────────────────────────────

    pub fn put_meta(&self, key: &str, value: &[u8]) -> Result<(), LedgerError> {
        self.meta
            .insert(key.as_bytes(), value)
            .map_err(|e| LedgerError::Storage(e.to_string()))?;
        Ok(())
    }

    pub fn get_meta(&self, key: &str) -> Result<Option<Vec<u8>>, LedgerError> {
        self.meta
            .get(key.as_bytes())
            .map(|v| v.map(|iv| iv.to_vec()))
            .map_err(|e| LedgerError::Storage(e.to_string()))
    }

    pub fn flush(&self) -> Result<(), LedgerError> {
        self.db.flush().map_err(|e| LedgerError::Storage(e.to_string()))?;
        Ok(())
    }
}

fn processed_key(address: &Address, nonce: Nonce) -> Vec<u8> {
    let mut key = Vec::with_capacity(28);
    key.extend_from_slice(address.as_bytes());
    key.extend_from_slice(&nonce.to_be_bytes());
    key
}
