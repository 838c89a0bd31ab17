use serde::{Deserialize, Serialize};

use crate::types::Amount;

/// Mempool eviction policy applied when the pool is at `max_pool_size`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EvictionPolicy {
    Price,
    Fifo,
    Lifo,
}

/// Every tunable named in §6, with the §5 defaults. Loaded from a
/// TOML/JSON file via `serde` and overridable by CLI flags, in the
/// teacher's `clap::Parser` style (see `poa-node::main::Args`).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Target time between block proposals, in milliseconds.
    pub block_time_ms: u64,
    /// How long the VOTING phase waits for a supermajority, in milliseconds.
    pub voting_period_ms: u64,
    /// Blocks between checkpoints.
    pub checkpoint_interval: u64,
    /// Blocks of depth after which a committed block is considered final
    /// for external consumers (not re-checked by the core state machine).
    pub finality_blocks: u64,
    /// Minimum validator-set size.
    pub min_validators: usize,

    pub max_block_size_bytes: usize,
    pub max_transactions_per_block: usize,
    pub max_gas_limit: u64,
    pub min_gas_price: Amount,
    pub max_gas_price: Amount,
    pub max_data_size_bytes: usize,

    pub max_pool_size: usize,
    pub per_account_limit: usize,
    pub eviction_policy: EvictionPolicy,
    pub max_retries: u32,
    pub max_tx_age_ms: u64,
    pub retry_after_ms: u64,

    pub heartbeat_interval_ms: u64,
    pub timeout_threshold_ms: u64,
    pub max_failed_rounds: u32,
    pub consecutive_timeouts_for_recovery: u32,
    pub accusation_threshold: u32,
    pub evidence_timeout_ms: u64,
    pub punishment_duration_ms: u64,
    pub partition_timeout_ms: u64,
    pub recovery_timeout_ms: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        let block_time_ms = 5_000;
        let heartbeat_interval_ms = 30_000;
        Self {
            block_time_ms,
            voting_period_ms: block_time_ms,
            checkpoint_interval: 1_000,
            finality_blocks: 6,
            min_validators: 4,

            max_block_size_bytes: 2 * 1024 * 1024,
            max_transactions_per_block: 5_000,
            max_gas_limit: 12_000_000,
            min_gas_price: Amount::from_u64(1),
            max_gas_price: Amount::from_u64(1_000_000_000_000),
            max_data_size_bytes: 64 * 1024,

            max_pool_size: 50_000,
            per_account_limit: 64,
            eviction_policy: EvictionPolicy::Price,
            max_retries: 5,
            max_tx_age_ms: 3_600_000,
            retry_after_ms: 60_000,

            heartbeat_interval_ms,
            timeout_threshold_ms: 3 * heartbeat_interval_ms,
            max_failed_rounds: 5,
            consecutive_timeouts_for_recovery: 3,
            accusation_threshold: 3,
            evidence_timeout_ms: 10 * 60_000,
            punishment_duration_ms: 60 * 60_000,
            partition_timeout_ms: 30_000,
            recovery_timeout_ms: 30_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voting_period_defaults_to_block_time() {
        let cfg = NodeConfig::default();
        assert!(cfg.voting_period_ms >= cfg.block_time_ms);
    }

    #[test]
    fn timeout_threshold_is_three_heartbeats() {
        let cfg = NodeConfig::default();
        assert_eq!(cfg.timeout_threshold_ms, 3 * cfg.heartbeat_interval_ms);
    }
}
