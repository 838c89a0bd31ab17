use poa_core::block::Block;
use poa_core::config::NodeConfig;
use poa_core::types::{Hash256, TimestampMs, TimestampSecs};
use poa_ledger::LedgerEngine;

use crate::error::FaultError;

/// Outcome of one [`RecoveryAttempt::sync`] call.
#[derive(Debug)]
pub enum RecoveryOutcome {
    /// Synced cleanly to `synced_to` and matched the last checkpoint.
    Resumed { synced_to: u64 },
    /// State diverged from the last checkpoint after sync: rewind and
    /// resume with a reduced quorum (§4.6 "EMERGENCY").
    Emergency { rewound_to: u64, reduced_quorum: usize },
}

/// One RECOVERY-phase attempt (§4.6 steps 1-4). The out-of-scope transport
/// (`poa-broadcast::BroadcastAdapter::request_sync`) supplies `peer_blocks`;
/// this type only verifies and applies them.
pub struct RecoveryAttempt {
    started_at: TimestampMs,
}

impl RecoveryAttempt {
    pub fn start(now: TimestampMs) -> Self {
        Self { started_at: now }
    }

    pub fn elapsed_ms(&self, now: TimestampMs) -> u64 {
        (now - self.started_at).max(0) as u64
    }

    pub fn timed_out(&self, cfg: &NodeConfig, now: TimestampMs) -> bool {
        self.elapsed_ms(now) > cfg.recovery_timeout_ms
    }

    /// Steps 2-3: apply a contiguous run of already-final peer blocks
    /// (`ledger.import_range` re-validates each one), then verify the
    /// resulting state against the last checkpoint's digest.
    pub fn sync(&self, ledger: &LedgerEngine, peer_blocks: Vec<Block>, cfg: &NodeConfig, now_secs: TimestampSecs) -> Result<RecoveryOutcome, FaultError> {
        ledger
            .import_range(peer_blocks, cfg, now_secs)
            .map_err(|e| FaultError::RecoveryTimeout {
                elapsed_ms: {
                    tracing::warn!(error = %e, "recovery sync failed to apply peer blocks");
                    0
                },
            })?;

        let head = ledger
            .latest()
            .map_err(|_| FaultError::RecoveryTimeout { elapsed_ms: 0 })?;
        let checkpoint = ledger
            .latest_checkpoint()
            .ok()
            .flatten();

        if let Some(checkpoint) = checkpoint {
            if head.number >= checkpoint.block_number {
                let digest = ledger.state_digest().unwrap_or(Hash256::ZERO);
                if digest != checkpoint.state_digest {
                    return Ok(RecoveryOutcome::Emergency {
                        rewound_to: checkpoint.block_number,
                        reduced_quorum: 0,
                    });
                }
            }
        }
        Ok(RecoveryOutcome::Resumed { synced_to: head.number })
    }

    /// Step 4: `⌈|active|/2⌉+1`, the reduced quorum used while in
    /// EMERGENCY to regain liveness.
    pub fn emergency_quorum(active_count: usize) -> usize {
        (active_count + 1) / 2 + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emergency_quorum_matches_formula() {
        assert_eq!(RecoveryAttempt::emergency_quorum(7), 5);
        assert_eq!(RecoveryAttempt::emergency_quorum(4), 3);
        assert_eq!(RecoveryAttempt::emergency_quorum(1), 2);
    }

    #[test]
    fn recovery_times_out_after_configured_window() {
        let cfg = NodeConfig {
            recovery_timeout_ms: 1_000,
            ..NodeConfig::default()
        };
        let attempt = RecoveryAttempt::start(0);
        assert!(!attempt.timed_out(&cfg, 500));
        assert!(attempt.timed_out(&cfg, 1_500));
    }
}
