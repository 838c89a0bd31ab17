use poa_core::block::Block;
use poa_core::config::NodeConfig;
use poa_core::consensus::{Checkpoint, ConsensusRound, RoundPhase, RoundStatus, Vote};
use poa_core::types::{Address, Hash256, TimestampMs, TimestampSecs};
use poa_core::validator::ValidatorSet;
use poa_crypto::{merkle_root, verify_bound, KeyPair};
use poa_ledger::LedgerEngine;
use poa_mempool::{Mempool, SelectStrategy};
use poa_validation::validate_block_header;

use crate::error::ConsensusError;
use crate::events::ConsensusEvent;

/// Drives one validator node's view of the consensus round state machine
/// (§4.5). Only one round is active at a time; transitions are explicit and
/// every exit produces [`ConsensusEvent`]s for the caller (`poa-node`) to
/// broadcast, log, or act on — the mediator pattern from §9.
pub struct ConsensusEngine {
    validators: ValidatorSet,
    cfg: NodeConfig,
    self_address: Address,
    round: ConsensusRound,
    failed_rounds: u32,
    consecutive_timeouts: u32,
}

impl ConsensusEngine {
    pub fn new(validators: ValidatorSet, cfg: NodeConfig, self_address: Address, now: TimestampMs) -> Self {
        let round = Self::start_round(0, &validators, &cfg, now);
        Self {
            validators,
            cfg,
            self_address,
            round,
            failed_rounds: 0,
            consecutive_timeouts: 0,
        }
    }

    pub fn current_round(&self) -> &ConsensusRound {
        &self.round
    }

    pub fn validators(&self) -> &ValidatorSet {
        &self.validators
    }

    pub fn validators_mut(&mut self) -> &mut ValidatorSet {
        &mut self.validators
    }

    pub fn is_self_proposer(&self) -> bool {
        self.round.proposer == self.self_address
    }

    /// `proposer(round) = activeValidators[round mod |activeValidators|]`
    /// (§4.5), sorted by reputation descending with address as tiebreaker
    /// — the ordering [`ValidatorSet::active`] already provides.
    pub fn proposer_for(round_number: u64, validators: &ValidatorSet, now: TimestampMs) -> Option<Address> {
        let active = validators.active(now);
        if active.is_empty() {
            return None;
        }
        Some(active[(round_number as usize) % active.len()])
    }

    fn start_round(round_number: u64, validators: &ValidatorSet, cfg: &NodeConfig, now: TimestampMs) -> ConsensusRound {
        let proposer = Self::proposer_for(round_number, validators, now).unwrap_or(Address::ZERO);
        ConsensusRound {
            round_number,
            phase: RoundPhase::Proposal,
            proposer,
            start_time: now,
            deadline: now + cfg.block_time_ms as i64,
            proposed_block: None,
            votes: Vec::new(),
            status: RoundStatus::Pending,
        }
    }

    /// PROPOSAL entry action for the proposer: select transactions from C4,
    /// build and sign the block.
    pub fn propose(
        &mut self,
        ledger: &LedgerEngine,
        mempool: &mut Mempool,
        keypair: &KeyPair,
        now_ms: TimestampMs,
        now_secs: TimestampSecs,
    ) -> Result<Vec<ConsensusEvent>, ConsensusError> {
        if self.round.phase != RoundPhase::Proposal {
            return Err(ConsensusError::UnexpectedPhase {
                round: self.round.round_number,
                phase: self.round.phase,
            });
        }
        if !self.is_self_proposer() {
            return Err(ConsensusError::InvalidProposer {
                round: self.round.round_number,
                expected: self.round.proposer,
                got: self.self_address,
            });
        }

        let parent = ledger.latest()?;
        let txs = mempool.select(
            self.cfg.max_gas_limit,
            self.cfg.max_transactions_per_block,
            SelectStrategy::Priority,
            now_ms,
        );
        let gas_used: u64 = txs.iter().map(|t| t.gas_limit).sum();
        let transactions_root = merkle_root(&txs.iter().map(|t| t.hash).collect::<Vec<_>>());

        let mut block = Block {
            number: parent.number + 1,
            parent_hash: parent.hash,
            timestamp: now_secs,
            validator: self.self_address,
            transactions: txs,
            transactions_root,
            // Neither is checked by §3's block invariants; synthesis is
            // deferred until a state-execution layer needs them.
            state_root: Hash256::ZERO,
            receipts_root: Hash256::ZERO,
            gas_limit: self.cfg.max_gas_limit,
            gas_used,
            extra_data: Vec::new(),
            hash: Hash256::ZERO,
            signature: Vec::new(),
        };
        let header = block.header();
        let canonical = poa_crypto::canonical_bytes(&header).map_err(|e| ConsensusError::Fatal(e.to_string()))?;
        block.hash = poa_crypto::hash(&canonical);
        block.signature = keypair.sign(&canonical);

        let mut events = vec![ConsensusEvent::ProposalMade(block.clone())];
        events.extend(self.enter_voting(block, ledger, Some(keypair), now_ms)?);
        Ok(events)
    }

    /// PROPOSAL exit condition for non-proposers: a valid proposal arrives.
    pub fn receive_proposal(
        &mut self,
        block: Block,
        ledger: &LedgerEngine,
        keypair: Option<&KeyPair>,
        now: TimestampMs,
    ) -> Result<Vec<ConsensusEvent>, ConsensusError> {
        if self.round.phase != RoundPhase::Proposal {
            return Err(ConsensusError::UnexpectedPhase {
                round: self.round.round_number,
                phase: self.round.phase,
            });
        }
        if block.validator != self.round.proposer {
            return Err(ConsensusError::InvalidProposer {
                round: self.round.round_number,
                expected: self.round.proposer,
                got: block.validator,
            });
        }
        self.enter_voting(block, ledger, keypair, now)
    }

    fn enter_voting(
        &mut self,
        block: Block,
        ledger: &LedgerEngine,
        keypair: Option<&KeyPair>,
        now: TimestampMs,
    ) -> Result<Vec<ConsensusEvent>, ConsensusError> {
        let parent = ledger.latest()?;
        let decision = validate_block_header(&block, &parent, &self.cfg, block.timestamp).is_ok();

        self.round.proposed_block = Some(block.clone());
        self.round.phase = RoundPhase::Voting;
        self.round.deadline = now + self.cfg.voting_period_ms as i64;

        let mut events = Vec::new();
        if let Some(kp) = keypair {
            let bytes = Vote::signing_bytes(&block.hash, self.round.round_number, decision);
            let vote = Vote {
                validator: self.self_address,
                block_hash: block.hash,
                decision,
                round_number: self.round.round_number,
                timestamp: now,
                signature: kp.sign(&bytes),
            };
            self.round.votes.push(vote.clone());
            events.push(ConsensusEvent::EnteredVoting {
                round: self.round.round_number,
                own_vote: vote,
            });
        }
        Ok(events)
    }

    /// VOTING entry/exit: record a vote, tally, and transition to COMMIT on
    /// supermajority. Duplicate votes are dropped; equivocation is an error
    /// the caller should turn into Byzantine evidence (§4.6).
    pub fn receive_vote(&mut self, vote: Vote, now: TimestampMs) -> Result<Vec<ConsensusEvent>, ConsensusError> {
        if self.round.phase != RoundPhase::Voting {
            return Err(ConsensusError::UnexpectedPhase {
                round: self.round.round_number,
                phase: self.round.phase,
            });
        }
        if vote.round_number != self.round.round_number {
            return Err(ConsensusError::StaleVote {
                current: self.round.round_number,
                got: vote.round_number,
            });
        }

        let bytes = Vote::signing_bytes(&vote.block_hash, vote.round_number, vote.decision);
        verify_bound(&bytes, &vote.signature, &vote.validator)
            .map_err(|e| ConsensusError::Validation(poa_validation::ValidationError::InvalidSignature(e.to_string())))?;

        if let Some(existing) = self.round.votes.iter().find(|v| v.validator == vote.validator) {
            if existing.block_hash != vote.block_hash || existing.decision != vote.decision {
                return Err(ConsensusError::Equivocation {
                    validator: vote.validator,
                    round: vote.round_number,
                });
            }
            return Ok(Vec::new());
        }
        self.round.votes.push(vote);

        let threshold = ValidatorSet::supermajority(self.validators.len());
        let approve = self.round.votes.iter().filter(|v| v.decision).count();
        let reject = self.round.votes.iter().filter(|v| !v.decision).count();

        let mut events = Vec::new();
        if approve >= threshold {
            self.round.phase = RoundPhase::Commit;
            self.round.status = RoundStatus::Success;
            events.push(ConsensusEvent::ConsensusReached {
                round: self.round.round_number,
                approved: true,
            });
        } else if reject >= threshold {
            self.round.phase = RoundPhase::Commit;
            self.round.status = RoundStatus::Failed;
            events.push(ConsensusEvent::ConsensusReached {
                round: self.round.round_number,
                approved: false,
            });
        } else if now > self.round.deadline {
            self.round.status = RoundStatus::Timeout;
            self.consecutive_timeouts += 1;
            events.push(ConsensusEvent::RoundFailed {
                round: self.round.round_number,
            });
        }
        Ok(events)
    }

    /// Timeout sweep: call periodically. Handles the PROPOSAL and VOTING
    /// timeout table entries.
    pub fn check_timeouts(&mut self, now: TimestampMs) -> Vec<ConsensusEvent> {
        match self.round.phase {
            RoundPhase::Proposal if now > self.round.deadline => {
                let suspected = self.round.proposer;
                self.round.status = RoundStatus::Timeout;
                self.consecutive_timeouts += 1;
                vec![ConsensusEvent::ProposerSuspected {
                    round: self.round.round_number,
                    validator: suspected,
                }]
            }
            RoundPhase::Voting if now > self.round.deadline => {
                self.round.status = RoundStatus::Timeout;
                self.consecutive_timeouts += 1;
                vec![ConsensusEvent::RoundFailed {
                    round: self.round.round_number,
                }]
            }
            _ => Vec::new(),
        }
    }

    /// COMMIT entry action: apply the approved block, or record rejection.
    /// Always exits to the next round.
    pub fn commit(
        &mut self,
        ledger: &LedgerEngine,
        mempool: &mut Mempool,
        now_ms: TimestampMs,
        now_secs: TimestampSecs,
    ) -> Result<Vec<ConsensusEvent>, ConsensusError> {
        let mut events = Vec::new();
        mempool.sweep(now_ms);

        match self.round.status {
            RoundStatus::Success => {
                let block = self
                    .round
                    .proposed_block
                    .clone()
                    .ok_or_else(|| ConsensusError::Fatal("approved round has no proposed block".into()))?;
                ledger.add_block(block.clone(), &self.cfg, now_secs)?;
                mempool.mark_processed(&block.transactions);
                events.push(ConsensusEvent::BlockCommitted(block.clone()));
                self.failed_rounds = 0;
                self.consecutive_timeouts = 0;

                if ledger.checkpoint_due(&self.cfg)? {
                    let checkpoint = self.build_checkpoint(ledger, block.number, block.hash)?;
                    ledger.store_checkpoint(checkpoint.clone())?;
                    events.push(ConsensusEvent::CheckpointCreated(checkpoint));
                }
            }
            RoundStatus::Failed | RoundStatus::Timeout => {
                events.push(ConsensusEvent::BlockRejected {
                    round: self.round.round_number,
                });
                self.failed_rounds += 1;
            }
            RoundStatus::Pending => {
                return Err(ConsensusError::UnexpectedPhase {
                    round: self.round.round_number,
                    phase: self.round.phase,
                });
            }
        }

        self.advance_round(now_ms);
        Ok(events)
    }

    fn build_checkpoint(&self, ledger: &LedgerEngine, block_number: u64, block_hash: Hash256) -> Result<Checkpoint, ConsensusError> {
        let state_digest = ledger.state_digest()?;
        Ok(Checkpoint {
            block_number,
            block_hash,
            validator_set: self.validators.members().to_vec(),
            state_digest,
            signatures: Vec::new(),
        })
    }

    fn advance_round(&mut self, now: TimestampMs) {
        let next = self.round.round_number + 1;
        self.round = Self::start_round(next, &self.validators, &self.cfg, now);
    }

    /// Recovery trigger: `failedRounds >= maxFailedRounds` or
    /// `consecutiveTimeouts >= 3` (§4.6). Returns `Some` with a reason if a
    /// recovery transition is warranted; the caller (poa-fault) drives the
    /// actual recovery protocol.
    pub fn needs_recovery(&self) -> Option<String> {
        if self.failed_rounds >= self.cfg.max_failed_rounds {
            return Some(format!("failedRounds {} >= maxFailedRounds {}", self.failed_rounds, self.cfg.max_failed_rounds));
        }
        if self.consecutive_timeouts >= self.cfg.consecutive_timeouts_for_recovery {
            return Some(format!(
                "consecutiveTimeouts {} >= {}",
                self.consecutive_timeouts, self.cfg.consecutive_timeouts_for_recovery
            ));
        }
        None
    }

    pub fn enter_recovery(&mut self, now: TimestampMs) {
        self.round.phase = RoundPhase::Recovery;
        self.round.status = RoundStatus::Pending;
        self.round.deadline = now + self.cfg.recovery_timeout_ms as i64;
    }

    /// Resume normal rounds after recovery succeeds.
    pub fn resume_from_recovery(&mut self, now: TimestampMs) -> ConsensusEvent {
        self.failed_rounds = 0;
        self.consecutive_timeouts = 0;
        let round = self.round.round_number;
        self.advance_round(now);
        ConsensusEvent::RecoveryResumed { round }
    }

}
