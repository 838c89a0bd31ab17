use std::collections::{HashMap, VecDeque};

use poa_core::config::NodeConfig;
use poa_core::constants::{
    MIN_PARTICIPATION_RATE, PARTICIPATION_WINDOW_ROUNDS, SLASH_DOUBLE_SIGNING, SLASH_EQUIVOCATION,
    SLASH_INVALID_BLOCK, SLASH_NON_PARTICIPATION,
};
use poa_core::types::{Address, TimestampMs};
use poa_core::validator::ValidatorSet;

/// The three Byzantine offenses of §4.6, plus the vote-level equivocation
/// case the consensus layer surfaces separately from block equivocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Offense {
    DoubleSigning,
    Equivocation,
    InvalidBlock,
    NonParticipation,
}

impl Offense {
    pub fn slash_weight(self) -> f64 {
        match self {
            Offense::DoubleSigning => SLASH_DOUBLE_SIGNING,
            Offense::Equivocation => SLASH_EQUIVOCATION,
            Offense::InvalidBlock => SLASH_INVALID_BLOCK,
            Offense::NonParticipation => SLASH_NON_PARTICIPATION,
        }
    }
}

/// Signed evidence accusing `offender` of `offense` in `round`.
#[derive(Clone, Debug)]
pub struct Accusation {
    pub offender: Address,
    pub offense: Offense,
    pub round: u64,
    pub accuser: Address,
    pub timestamp: TimestampMs,
}

/// Jailing a validator: reputation slash plus a `jailed_until` deadline
/// (§4.6 "jailed for `punishmentDuration`").
#[derive(Clone, Debug)]
pub struct JailEvent {
    pub offender: Address,
    pub offense: Offense,
    pub jailed_until: TimestampMs,
}

/// Accumulates accusations and round-participation history per validator,
/// and jails once `accusationThreshold` accusations land within
/// `evidenceTimeout` (§4.6 "Byzantine detection").
#[derive(Default)]
pub struct ByzantineTracker {
    accusations: HashMap<Address, Vec<Accusation>>,
    participation: HashMap<Address, VecDeque<bool>>,
}

impl ByzantineTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one accusation. Accusations older than `evidenceTimeout`
    /// relative to `now` are dropped before counting, so only a burst
    /// within the window can trigger jailing. Returns the jail event when
    /// the threshold is reached.
    pub fn accuse(
        &mut self,
        accusation: Accusation,
        cfg: &NodeConfig,
        validators: &mut ValidatorSet,
        now: TimestampMs,
    ) -> Option<JailEvent> {
        let offender = accusation.offender;
        let entry = self.accusations.entry(offender).or_default();
        entry.retain(|a| now - a.timestamp <= cfg.evidence_timeout_ms as i64);
        entry.push(accusation.clone());

        if entry.len() < cfg.accusation_threshold as usize {
            return None;
        }
        entry.clear();

        let jailed_until = now + cfg.punishment_duration_ms as i64;
        if let Some(h) = validators.health_mut(&offender) {
            h.slash(accusation.offense.slash_weight());
            h.jailed_until = Some(jailed_until);
        }
        Some(JailEvent {
            offender,
            offense: accusation.offense,
            jailed_until,
        })
    }

    /// Record whether `validator` participated in the most recent round
    /// (cast a vote, or proposed). Keeps a sliding window of
    /// `PARTICIPATION_WINDOW_ROUNDS` samples.
    pub fn record_participation(&mut self, validator: Address, participated: bool) {
        let window = self.participation.entry(validator).or_default();
        window.push_back(participated);
        if window.len() > PARTICIPATION_WINDOW_ROUNDS {
            window.pop_front();
        }
    }

    /// "round participation rate < 50% over a window": only meaningful once
    /// the window has filled, to avoid punishing a newly joined validator.
    pub fn is_non_participant(&self, validator: &Address) -> bool {
        match self.participation.get(validator) {
            Some(window) if window.len() == PARTICIPATION_WINDOW_ROUNDS => {
                let rate = window.iter().filter(|p| **p).count() as f64 / window.len() as f64;
                rate < MIN_PARTICIPATION_RATE
            }
            _ => false,
        }
    }
}
