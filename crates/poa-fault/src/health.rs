use poa_core::config::NodeConfig;
use poa_core::constants::CONSECUTIVE_FAILURES_THRESHOLD;
use poa_core::types::{Address, TimestampMs};
use poa_core::validator::{HealthStatus, ValidatorSet};

/// Smoothing factor for the `successRate` exponential moving average.
const SUCCESS_RATE_ALPHA: f64 = 0.2;
const REPUTATION_REWARD: f64 = 1.0;

/// Mutates [`ValidatorSet`] health records per §4.6 "Health monitor". Holds
/// no state of its own — the validator set is the single source of truth,
/// owned by the fault detector per §3 "Ownership".
pub struct HealthMonitor<'a> {
    cfg: &'a NodeConfig,
}

impl<'a> HealthMonitor<'a> {
    pub fn new(cfg: &'a NodeConfig) -> Self {
        Self { cfg }
    }

    /// "update `lastSeen` on receipt of any signed message".
    pub fn record_message(&self, validators: &mut ValidatorSet, validator: &Address, now: TimestampMs, response_time_ms: u64) {
        if let Some(h) = validators.health_mut(validator) {
            h.last_seen = now;
            h.response_time_ms = response_time_ms;
            h.consecutive_failures = 0;
            if matches!(h.status, HealthStatus::Suspected | HealthStatus::Failed) {
                h.status = HealthStatus::Recovering;
            }
            h.reward(REPUTATION_REWARD);
        }
    }

    /// "update `successRate` and `responseTime` per round outcome"; on
    /// `>=3 consecutive failures` the validator is marked FAILED.
    pub fn record_round_outcome(&self, validators: &mut ValidatorSet, validator: &Address, succeeded: bool) {
        if let Some(h) = validators.health_mut(validator) {
            let sample = if succeeded { 1.0 } else { 0.0 };
            h.success_rate = h.success_rate * (1.0 - SUCCESS_RATE_ALPHA) + sample * SUCCESS_RATE_ALPHA;

            if succeeded {
                h.consecutive_failures = 0;
                if matches!(h.status, HealthStatus::Suspected | HealthStatus::Recovering) {
                    h.status = HealthStatus::Active;
                }
            } else {
                h.consecutive_failures += 1;
                if h.consecutive_failures >= CONSECUTIVE_FAILURES_THRESHOLD {
                    h.status = HealthStatus::Failed;
                }
            }
        }
    }

    /// "on `now - lastSeen > timeoutThreshold` → SUSPECTED". Run
    /// periodically over the whole validator set.
    pub fn sweep_timeouts(&self, validators: &mut ValidatorSet, now: TimestampMs) {
        let members = validators.members().to_vec();
        for addr in members {
            if let Some(h) = validators.health_mut(&addr) {
                if matches!(h.status, HealthStatus::Active | HealthStatus::Recovering)
                    && now - h.last_seen > self.cfg.timeout_threshold_ms as i64
                {
                    h.status = HealthStatus::Suspected;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use poa_core::types::Address;

    fn validators(n: usize, now: TimestampMs) -> ValidatorSet {
        let members: Vec<Address> = (0..n).map(|i| Address::from_bytes([i as u8; 20])).collect();
        ValidatorSet::new(members, now)
    }

    #[test]
    fn timeout_sweep_marks_suspected() {
        let now = 1_700_000_000_000;
        let cfg = NodeConfig::default();
        let mut vs = validators(3, now);
        let monitor = HealthMonitor::new(&cfg);

        let later = now + cfg.timeout_threshold_ms as i64 + 1;
        monitor.sweep_timeouts(&mut vs, later);

        for addr in vs.members().to_vec() {
            assert_eq!(vs.health(&addr).unwrap().status, HealthStatus::Suspected);
        }
    }

    #[test]
    fn three_consecutive_failures_mark_failed() {
        let now = 1_700_000_000_000;
        let cfg = NodeConfig::default();
        let mut vs = validators(1, now);
        let monitor = HealthMonitor::new(&cfg);
        let addr = vs.members()[0];

        for _ in 0..3 {
            monitor.record_round_outcome(&mut vs, &addr, false);
        }
        assert_eq!(vs.health(&addr).unwrap().status, HealthStatus::Failed);
    }

    #[test]
    fn message_receipt_recovers_from_suspected() {
        let now = 1_700_000_000_000;
        let cfg = NodeConfig::default();
        let mut vs = validators(1, now);
        let monitor = HealthMonitor::new(&cfg);
        let addr = vs.members()[0];
        vs.health_mut(&addr).unwrap().status = HealthStatus::Suspected;

        monitor.record_message(&mut vs, &addr, now + 1, 10);
        assert_eq!(vs.health(&addr).unwrap().status, HealthStatus::Recovering);
    }
}
