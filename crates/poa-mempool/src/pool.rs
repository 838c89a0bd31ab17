use std::collections::{HashMap, HashSet};

use poa_core::config::{EvictionPolicy, NodeConfig};
use poa_core::transaction::Transaction;
use poa_core::types::{Address, Hash256, Nonce, TimestampMs};
use poa_validation::validate_transaction_structural;

use crate::error::MempoolError;

/// One pooled transaction plus the bookkeeping `select`/eviction/retry need
/// (§4.4: "A mapping from `txHash` to `{tx, addedAt, priority, retries,
/// lastAttempt}`").
#[derive(Clone, Debug)]
pub struct PooledTransaction {
    pub tx: Transaction,
    pub added_at: TimestampMs,
    pub retries: u32,
    pub last_attempt: Option<TimestampMs>,
}

impl PooledTransaction {
    /// `p = gasPrice + value·10⁻⁴ − ageMs·10⁻³` (§4.4 "Priority formula").
    fn priority(&self, now: TimestampMs) -> f64 {
        let gas_price = self.tx.gas_price.to_string().parse::<f64>().unwrap_or(f64::MAX);
        let value = self.tx.value.to_string().parse::<f64>().unwrap_or(0.0);
        let age_ms = (now - self.added_at).max(0) as f64;
        gas_price + value * 1e-4 - age_ms * 1e-3
    }
}

/// Selection ordering requested from [`Mempool::select`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectStrategy {
    Priority,
    Price,
    Fifo,
}

/// The pending-transaction pool (C4). Owns pending transactions exclusively
/// — a transaction only leaves via [`Mempool::mark_processed`], in the same
/// logical step as ledger commit (§3 "Ownership").
pub struct Mempool {
    by_hash: HashMap<Hash256, PooledTransaction>,
    by_account: HashMap<Address, HashSet<Hash256>>,
    expected_nonce: HashMap<Address, Nonce>,
    blacklist: HashSet<Hash256>,
    cfg: NodeConfig,
}

impl Mempool {
    pub fn new(cfg: NodeConfig) -> Self {
        Self {
            by_hash: HashMap::new(),
            by_account: HashMap::new(),
            expected_nonce: HashMap::new(),
            blacklist: HashSet::new(),
            cfg,
        }
    }

    pub fn len(&self) -> usize {
        self.by_hash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_hash.is_empty()
    }

    pub fn blacklist(&mut self, hash: Hash256) {
        self.blacklist.insert(hash);
    }

    pub fn expected_nonce(&self, address: &Address) -> Nonce {
        self.expected_nonce.get(address).copied().unwrap_or(0)
    }

    /// `Admit(tx) → Result` (§4.4).
    pub fn admit(&mut self, tx: Transaction, now: TimestampMs) -> Result<(), MempoolError> {
        if self.blacklist.contains(&tx.hash) {
            return Err(MempoolError::Blacklisted(tx.hash));
        }
        if self.by_hash.contains_key(&tx.hash) {
            return Err(MempoolError::Duplicate(tx.hash));
        }

        // C2 steps 1–3, 5: structural, hash, signature/binding, gas/data bounds.
        validate_transaction_structural(&tx, &self.cfg, now)?;

        let expected = self.expected_nonce(&tx.from);
        if tx.nonce < expected {
            return Err(MempoolError::NonceTooLow {
                address: tx.from,
                expected,
                got: tx.nonce,
            });
        }

        let account_count = self.by_account.get(&tx.from).map(|s| s.len()).unwrap_or(0);
        if account_count >= self.cfg.per_account_limit {
            return Err(MempoolError::AccountLimitReached {
                address: tx.from,
                count: account_count,
                limit: self.cfg.per_account_limit,
            });
        }

        if self.by_hash.len() >= self.cfg.max_pool_size {
            if let Some(victim) = self.eviction_candidate(now) {
                self.remove(&victim);
            }
        }

        let hash = tx.hash;
        let from = tx.from;
        self.by_hash.insert(
            hash,
            PooledTransaction {
                tx,
                added_at: now,
                retries: 0,
                last_attempt: None,
            },
        );
        self.by_account.entry(from).or_default().insert(hash);
        Ok(())
    }

    fn eviction_candidate(&self, now: TimestampMs) -> Option<Hash256> {
        match self.cfg.eviction_policy {
            EvictionPolicy::Price => self
                .by_hash
                .values()
                .min_by(|a, b| a.tx.gas_price.cmp(&b.tx.gas_price))
                .map(|p| p.tx.hash),
            EvictionPolicy::Fifo => self
                .by_hash
                .values()
                .min_by_key(|p| p.added_at)
                .map(|p| p.tx.hash),
            EvictionPolicy::Lifo => self
                .by_hash
                .values()
                .max_by_key(|p| p.added_at)
                .map(|p| p.tx.hash),
        }
        .map(|h| {
            let _ = now;
            h
        })
    }

    fn remove(&mut self, hash: &Hash256) {
        if let Some(pooled) = self.by_hash.remove(hash) {
            if let Some(set) = self.by_account.get_mut(&pooled.tx.from) {
                set.remove(hash);
                if set.is_empty() {
                    self.by_account.remove(&pooled.tx.from);
                }
            }
        }
    }

    /// `Select(gasLimit, maxCount, strategy) → tx[]` (§4.4).
    pub fn select(&mut self, gas_limit: u64, max_count: usize, strategy: SelectStrategy, now: TimestampMs) -> Vec<Transaction> {
        let mut candidates: Vec<&PooledTransaction> = self.by_hash.values().collect();
        match strategy {
            SelectStrategy::Priority => {
                candidates.sort_by(|a, b| {
                    b.priority(now)
                        .partial_cmp(&a.priority(now))
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then_with(|| a.added_at.cmp(&b.added_at))
                });
            }
            SelectStrategy::Price => {
                candidates.sort_by(|a, b| {
                    b.tx.gas_price
                        .cmp(&a.tx.gas_price)
                        .then_with(|| a.added_at.cmp(&b.added_at))
                });
            }
            SelectStrategy::Fifo => {
                candidates.sort_by_key(|p| p.added_at);
            }
        }

        let mut selected = Vec::new();
        let mut total_gas = 0u64;
        for pooled in candidates {
            if selected.len() >= max_count {
                break;
            }
            let estimated = pooled.tx.estimated_gas();
            if total_gas + estimated > gas_limit {
                continue;
            }
            total_gas += estimated;
            selected.push(pooled.tx.clone());
        }

        let selected_hashes: Vec<Hash256> = selected.iter().map(|t| t.hash).collect();
        for hash in selected_hashes {
            if let Some(pooled) = self.by_hash.get_mut(&hash) {
                pooled.last_attempt = Some(now);
            }
        }
        selected
    }

    /// `markProcessed(txs)` (§4.4): remove from pool, advance
    /// `expectedNonce`. Called in the same logical step as ledger commit
    /// (§3 "Ownership").
    pub fn mark_processed(&mut self, txs: &[Transaction]) {
        for tx in txs {
            self.remove(&tx.hash);
            let entry = self.expected_nonce.entry(tx.from).or_insert(0);
            *entry = (*entry).max(tx.nonce + 1);
        }
    }

    /// Retry/expiry sweep, run after every commit (§4.4).
    pub fn sweep(&mut self, now: TimestampMs) {
        let max_age = self.cfg.max_tx_age_ms;
        let retry_after = self.cfg.retry_after_ms;
        let max_retries = self.cfg.max_retries;

        let expired: Vec<Hash256> = self
            .by_hash
            .values()
            .filter(|p| now - p.added_at > max_age as i64)
            .map(|p| p.tx.hash)
            .collect();
        for hash in expired {
            self.remove(&hash);
        }

        for pooled in self.by_hash.values_mut() {
            if let Some(last) = pooled.last_attempt {
                if now - last > retry_after as i64 {
                    if pooled.retries < max_retries {
                        pooled.retries += 1;
                        pooled.last_attempt = None;
                    }
                }
            }
        }
    }

    pub fn contains(&self, hash: &Hash256) -> bool {
        self.by_hash.contains_key(hash)
    }

    pub fn pending(&self) -> Vec<Transaction> {
        self.by_hash.values().map(|p| p.tx.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use poa_core::types::Amount;
    use poa_crypto::{canonical_bytes, hash, KeyPair};

    fn make_tx(kp: &KeyPair, to: Address, nonce: u64, gas_price: u64, now: TimestampMs) -> Transaction {
        let mut tx = Transaction {
            from: kp.address,
            to,
            value: Amount::from_u64(10),
            data: Vec::new(),
            nonce,
            gas_limit: 21_000,
            gas_price: Amount::from_u64(gas_price),
            timestamp: now,
            signature: Vec::new(),
            hash: Hash256::ZERO,
        };
        let body = tx.body();
        let canonical = canonical_bytes(&body).unwrap();
        tx.hash = hash(&canonical);
        tx.signature = kp.sign(&canonical);
        tx
    }

    #[test]
    fn admits_and_selects_by_priority() {
        let kp = KeyPair::generate();
        let to = KeyPair::generate().address;
        let now = 1_700_000_000_000;
        let mut pool = Mempool::new(NodeConfig::default());

        pool.admit(make_tx(&kp, to, 0, 5, now), now).unwrap();
        assert_eq!(pool.len(), 1);

        let selected = pool.select(1_000_000, 10, SelectStrategy::Price, now);
        assert_eq!(selected.len(), 1);
    }

    #[test]
    fn duplicate_hash_is_rejected() {
        let kp = KeyPair::generate();
        let to = KeyPair::generate().address;
        let now = 1_700_000_000_000;
        let mut pool = Mempool::new(NodeConfig::default());
        let tx = make_tx(&kp, to, 0, 5, now);
        pool.admit(tx.clone(), now).unwrap();
        assert!(matches!(pool.admit(tx, now), Err(MempoolError::Duplicate(_))));
    }

    #[test]
    fn nonce_below_expected_is_rejected() {
        let kp = KeyPair::generate();
        let to = KeyPair::generate().address;
        let now = 1_700_000_000_000;
        let mut pool = Mempool::new(NodeConfig::default());
        let tx0 = make_tx(&kp, to, 0, 5, now);
        pool.admit(tx0.clone(), now).unwrap();
        pool.mark_processed(&[tx0]);

        let stale = make_tx(&kp, to, 0, 5, now);
        assert!(matches!(
            pool.admit(stale, now),
            Err(MempoolError::NonceTooLow { .. })
        ));
    }

    #[test]
    fn sweep_evicts_transactions_past_max_age() {
        let kp = KeyPair::generate();
        let to = KeyPair::generate().address;
        let now = 1_700_000_000_000;
        let cfg = NodeConfig {
            max_tx_age_ms: 1_000,
            ..NodeConfig::default()
        };
        let mut pool = Mempool::new(cfg.clone());
        pool.admit(make_tx(&kp, to, 0, 5, now), now).unwrap();

        let still_fresh = now + cfg.max_tx_age_ms as i64 - 1;
        pool.sweep(still_fresh);
        assert_eq!(pool.len(), 1);

        let expired = now + cfg.max_tx_age_ms as i64 + 1;
        pool.sweep(expired);
        assert!(pool.is_empty());
    }

    #[test]
    fn sweep_retries_a_stalled_selection_after_retry_window() {
        let kp = KeyPair::generate();
        let to = KeyPair::generate().address;
        let now = 1_700_000_000_000;
        let cfg = NodeConfig {
            retry_after_ms: 1_000,
            ..NodeConfig::default()
        };
        let mut pool = Mempool::new(cfg.clone());
        pool.admit(make_tx(&kp, to, 0, 5, now), now).unwrap();
        pool.select(1_000_000, 10, SelectStrategy::Priority, now);

        let after_retry_window = now + cfg.retry_after_ms as i64 + 1;
        pool.sweep(after_retry_window);

        let hash = pool.pending()[0].hash;
        assert_eq!(pool.by_hash.get(&hash).unwrap().retries, 1);
        assert!(pool.by_hash.get(&hash).unwrap().last_attempt.is_none());
    }

    #[test]
    fn mark_processed_advances_expected_nonce_and_clears_pool() {
        let kp = KeyPair::generate();
        let to = KeyPair::generate().address;
        let now = 1_700_000_000_000;
        let mut pool = Mempool::new(NodeConfig::default());
        let tx = make_tx(&kp, to, 0, 5, now);
        pool.admit(tx.clone(), now).unwrap();
        pool.mark_processed(&[tx.clone()]);
        assert!(pool.is_empty());
        assert_eq!(pool.expected_nonce(&kp.address), 1);
    }
}
