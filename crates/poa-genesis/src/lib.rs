//! Genesis loading and application (§4.3 "Ledger state", §6 "Genesis
//! file"): parses the genesis file `{timestamp, gasLimit, extraData,
//! alloc}`, synthesizes block 0, and hands both to `poa-ledger` for
//! initialization. Owns the `Genesis` description itself — `poa-ledger`
//! only needs the resulting block and account map.

pub mod error;

pub use error::GenesisError;

use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;
use tracing::info;

use poa_core::account::AccountState;
use poa_core::block::Block;
use poa_core::types::{Address, Amount, Hash256, Nonce, TimestampSecs};
use poa_ledger::LedgerEngine;

/// The wire shape of a genesis file: addresses and amounts as strings, the
/// same convention the rest of the wire contract uses for 256-bit values
/// and hex-encoded bytes.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenesisFile {
    timestamp: TimestampSecs,
    gas_limit: String,
    #[serde(default)]
    extra_data: String,
    alloc: BTreeMap<String, GenesisAllocEntry>,
}

#[derive(Debug, Deserialize)]
struct GenesisAllocEntry {
    balance: String,
    #[serde(default)]
    nonce: Nonce,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    storage: Option<BTreeMap<String, String>>,
}

/// A fully parsed, ready-to-apply genesis description.
#[derive(Debug, Clone)]
pub struct GenesisConfig {
    pub timestamp: TimestampSecs,
    pub gas_limit: u64,
    pub extra_data: Vec<u8>,
    pub alloc: BTreeMap<Address, AccountState>,
}

/// Parse a genesis file from disk.
pub fn load_genesis_file<P: AsRef<Path>>(path: P) -> Result<GenesisConfig, GenesisError> {
    let raw = std::fs::read_to_string(path)?;
    parse_genesis_str(&raw)
}

/// Parse a genesis file already read into memory.
pub fn parse_genesis_str(raw: &str) -> Result<GenesisConfig, GenesisError> {
    let file: GenesisFile = serde_json::from_str(raw)?;

    let gas_limit_u256 = Amount::from_str(&file.gas_limit)
        .map_err(|_| GenesisError::InvalidAmount(file.gas_limit.clone()))?
        .0;
    if gas_limit_u256 > primitive_types::U256::from(u64::MAX) {
        return Err(GenesisError::GasLimitOverflow(file.gas_limit.clone()));
    }
    let gas_limit = gas_limit_u256.as_u64();

    let extra_data = if file.extra_data.is_empty() {
        Vec::new()
    } else {
        decode_hex(&file.extra_data)?
    };

    let mut alloc = BTreeMap::new();
    for (addr_str, entry) in file.alloc {
        let address =
            Address::from_hex(&addr_str).map_err(|_| GenesisError::InvalidAddress(addr_str.clone()))?;
        let balance = Amount::from_str(&entry.balance)
            .map_err(|_| GenesisError::InvalidAmount(entry.balance.clone()))?;
        let code = entry.code.as_deref().map(decode_hex).transpose()?;
        alloc.insert(
            address,
            AccountState {
                balance,
                nonce: entry.nonce,
                code,
                storage: entry.storage,
            },
        );
    }

    Ok(GenesisConfig {
        timestamp: file.timestamp,
        gas_limit,
        extra_data,
        alloc,
    })
}

fn decode_hex(s: &str) -> Result<Vec<u8>, GenesisError> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(s).map_err(|_| GenesisError::InvalidHex(s.to_string()))
}

/// Synthesize block 0 from `config`: an empty transaction list, the system
/// validator address (the zero address — genesis carries no signature),
/// a state root over the allocation, and zero gas used.
pub fn build_genesis_block(config: &GenesisConfig) -> Result<Block, GenesisError> {
    let accounts: Vec<(Address, AccountState)> =
        config.alloc.iter().map(|(a, s)| (*a, s.clone())).collect();
    let state_root = poa_crypto::hash(
        &poa_crypto::canonical_bytes(&accounts).map_err(|e| GenesisError::InvalidHex(e.to_string()))?,
    );

    let mut block = Block {
        number: 0,
        parent_hash: Hash256::ZERO,
        timestamp: config.timestamp,
        validator: Address::ZERO,
        transactions: Vec::new(),
        transactions_root: poa_crypto::merkle_root(&[]),
        state_root,
        receipts_root: Hash256::ZERO,
        gas_limit: config.gas_limit,
        gas_used: 0,
        extra_data: config.extra_data.clone(),
        hash: Hash256::ZERO,
        signature: Vec::new(),
    };

    let canonical = poa_crypto::canonical_bytes(&block.header())
        .map_err(|e| GenesisError::InvalidHex(e.to_string()))?;
    block.hash = poa_crypto::hash(&canonical);

    Ok(block)
}

/// Apply `config` to a freshly opened, uninitialized ledger. Returns the
/// synthesized genesis block. This is the one place in the protocol where
/// account balances are created rather than transferred.
pub fn apply_genesis(ledger: &LedgerEngine, config: &GenesisConfig) -> Result<Block, GenesisError> {
    let block = build_genesis_block(config)?;
    ledger.init_genesis(block.clone(), config.alloc.clone())?;
    info!(
        accounts = config.alloc.len(),
        gas_limit = config.gas_limit,
        hash = %block.hash,
        "genesis state applied"
    );
    Ok(block)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_genesis_json() -> String {
        r#"{
            "timestamp": 1735689600,
            "gasLimit": "30000000",
            "extraData": "0xdeadbeef",
            "alloc": {
                "0x0000000000000000000000000000000000000001": { "balance": "1000000000000000000000" },
                "0x0000000000000000000000000000000000000002": { "balance": "500", "nonce": 3 }
            }
        }"#
        .to_string()
    }

    #[test]
    fn parses_genesis_file_and_alloc() {
        let config = parse_genesis_str(&sample_genesis_json()).unwrap();
        assert_eq!(config.timestamp, 1_735_689_600);
        assert_eq!(config.gas_limit, 30_000_000);
        assert_eq!(config.extra_data, vec![0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(config.alloc.len(), 2);

        let addr2 = Address::from_hex("0x0000000000000000000000000000000000000002").unwrap();
        assert_eq!(config.alloc[&addr2].nonce, 3);
    }

    #[test]
    fn rejects_malformed_address() {
        let raw = r#"{
            "timestamp": 0,
            "gasLimit": "1",
            "alloc": { "not-an-address": { "balance": "1" } }
        }"#;
        assert!(matches!(
            parse_genesis_str(raw),
            Err(GenesisError::InvalidAddress(_))
        ));
    }

    #[test]
    fn build_genesis_block_is_deterministic_and_self_consistent() {
        let config = parse_genesis_str(&sample_genesis_json()).unwrap();
        let a = build_genesis_block(&config).unwrap();
        let b = build_genesis_block(&config).unwrap();
        assert_eq!(a.hash, b.hash);
        assert_eq!(a.number, 0);
        assert_eq!(a.transactions_root, poa_crypto::merkle_root(&[]));
    }

    #[test]
    fn apply_genesis_initializes_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = LedgerEngine::open(dir.path()).unwrap();
        let config = parse_genesis_str(&sample_genesis_json()).unwrap();

        let block = apply_genesis(&ledger, &config).unwrap();
        assert_eq!(ledger.block_count(), 1);
        assert_eq!(ledger.latest().unwrap().hash, block.hash);

        let addr1 = Address::from_hex("0x0000000000000000000000000000000000000001").unwrap();
        let account = ledger.account(&addr1).unwrap().unwrap();
        assert_eq!(account.balance.to_string(), "1000000000000000000000");
    }
}
