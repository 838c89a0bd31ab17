use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::{Address, TimestampMs};

/// Liveness classification for a single validator, per §3.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    Active,
    Suspected,
    Failed,
    Recovering,
}

/// Per-validator health record, mutated only by the fault detector (§5).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealthRecord {
    pub status: HealthStatus,
    pub last_seen: TimestampMs,
    pub response_time_ms: u64,
    pub success_rate: f64,
    pub consecutive_failures: u32,
    /// Smoothed performance score, floor 0, ceiling 100.
    pub reputation: f64,
    /// Jailed until this timestamp (exclusive), or `None` if not jailed.
    pub jailed_until: Option<TimestampMs>,
}

impl HealthRecord {
    pub fn new(now: TimestampMs) -> Self {
        Self {
            status: HealthStatus::Active,
            last_seen: now,
            response_time_ms: 0,
            success_rate: 1.0,
            consecutive_failures: 0,
            reputation: 100.0,
            jailed_until: None,
        }
    }

    pub fn is_jailed(&self, now: TimestampMs) -> bool {
        self.jailed_until.is_some_and(|until| now < until)
    }

    pub fn slash(&mut self, weight: f64) {
        self.reputation = (self.reputation - weight).max(0.0);
    }

    pub fn reward(&mut self, amount: f64) {
        self.reputation = (self.reputation + amount).min(100.0);
    }
}

/// The pre-approved validator set plus per-validator health.
///
/// Ordering is deterministic: `ordered()` sorts by reputation descending,
/// address ascending as tiebreaker, so every honest node computing over the
/// same health view agrees on the same order (§4.5 "Proposer selection").
#[derive(Clone, Debug, Default)]
pub struct ValidatorSet {
    members: Vec<Address>,
    health: HashMap<Address, HealthRecord>,
}

impl ValidatorSet {
    pub fn new(members: Vec<Address>, now: TimestampMs) -> Self {
        let health = members
            .iter()
            .map(|a| (*a, HealthRecord::new(now)))
            .collect();
        Self { members, health }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn members(&self) -> &[Address] {
        &self.members
    }

    pub fn contains(&self, addr: &Address) -> bool {
        self.members.contains(addr)
    }

    pub fn health(&self, addr: &Address) -> Option<&HealthRecord> {
        self.health.get(addr)
    }

    pub fn health_mut(&mut self, addr: &Address) -> Option<&mut HealthRecord> {
        self.health.get_mut(addr)
    }

    /// Validators eligible to propose/lead: `ACTIVE` or `RECOVERING`, and
    /// not currently jailed.
    pub fn active(&self, now: TimestampMs) -> Vec<Address> {
        let mut active: Vec<Address> = self
            .members
            .iter()
            .filter(|a| {
                self.health.get(*a).is_some_and(|h| {
                    matches!(h.status, HealthStatus::Active | HealthStatus::Recovering)
                        && !h.is_jailed(now)
                })
            })
            .copied()
            .collect();
        active.sort_by(|a, b| self.rank_key(b).partial_cmp(&self.rank_key(a)).unwrap());
        active
    }

    fn rank_key(&self, addr: &Address) -> (f64, std::cmp::Reverse<[u8; 20]>) {
        let rep = self.health.get(addr).map(|h| h.reputation).unwrap_or(0.0);
        (rep, std::cmp::Reverse(addr.0))
    }

    /// `⌊2n/3⌋+1` — the supermajority threshold over the full registered
    /// set size, so a minority partition can never self-satisfy quorum by
    /// marking the unreachable majority failed in its own local view.
    pub fn supermajority(active_count: usize) -> usize {
        (2 * active_count) / 3 + 1
    }

    /// `⌈2n/3⌉` — the partition-majority threshold over the full set size.
    pub fn ceil_two_thirds(n: usize) -> usize {
        (2 * n + 2) / 3
    }
}
