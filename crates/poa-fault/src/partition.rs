use poa_core::types::{Address, TimestampMs};
use poa_core::validator::{HealthStatus, ValidatorSet};

use crate::error::FaultError;

/// Result of one partition check (§4.6 "Partition detection").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PartitionStatus {
    pub active: usize,
    pub total: usize,
    pub needed: usize,
}

impl PartitionStatus {
    pub fn is_partitioned(&self) -> bool {
        self.active < self.needed
    }
}

/// "If the set of ACTIVE peers has size < `⌈2n/3⌉`, a partition is
/// declared." Uses [`ValidatorSet::active`], which already excludes jailed
/// and non-{ACTIVE,RECOVERING} members.
pub fn detect(validators: &ValidatorSet, now: TimestampMs) -> PartitionStatus {
    let total = validators.len();
    let active = validators.active(now).len();
    let needed = ValidatorSet::ceil_two_thirds(total);
    PartitionStatus { active, total, needed }
}

/// Errors out when this node's view is in the minority partition — callers
/// should pause block commits and enter RECOVERY.
pub fn check(validators: &ValidatorSet, now: TimestampMs) -> Result<PartitionStatus, FaultError> {
    let status = detect(validators, now);
    if status.is_partitioned() {
        Err(FaultError::PartitionDetected {
            active: status.active,
            total: status.total,
            needed: status.needed,
        })
    } else {
        Ok(status)
    }
}

/// "Leader failover": the ACTIVE validator (strictly `ACTIVE`, not
/// `RECOVERING`) with the highest reputation, ties broken by address.
/// Every honest node computes the same winner from the same health view.
pub fn elect_leader(validators: &ValidatorSet, now: TimestampMs) -> Option<Address> {
    let mut candidates: Vec<Address> = validators
        .members()
        .iter()
        .filter(|a| {
            validators
                .health(a)
                .is_some_and(|h| h.status == HealthStatus::Active && !h.is_jailed(now))
        })
        .copied()
        .collect();

    candidates.sort_by(|a, b| {
        let ra = validators.health(a).map(|h| h.reputation).unwrap_or(0.0);
        let rb = validators.health(b).map(|h| h.reputation).unwrap_or(0.0);
        rb.partial_cmp(&ra)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.as_bytes().cmp(b.as_bytes()))
    });
    candidates.into_iter().next()
}
