use poa_core::block::Block;
use poa_core::consensus::{Checkpoint, Vote};
use poa_core::types::Address;

/// Everything the state machine can report back to its caller, in one
/// closed enum (§9 "typed event enum, mediator pattern between
/// consensus/ledger/mempool"). `poa-node` matches on these to drive
/// broadcast, logging, and the admin API; `poa-consensus` never calls a
/// broadcast adapter directly.
#[derive(Debug, Clone)]
pub enum ConsensusEvent {
    /// This node proposed a block and it should be broadcast.
    ProposalMade(Block),
    /// A valid proposal was accepted into VOTING; this node's own vote is
    /// attached and should be broadcast.
    EnteredVoting { round: u64, own_vote: Vote },
    /// The proposer for the round failed to propose by `proposalTimeout`.
    ProposerSuspected { round: u64, validator: Address },
    /// Consensus was reached this round.
    ConsensusReached { round: u64, approved: bool },
    /// A round failed to reach consensus (reject supermajority or timeout).
    RoundFailed { round: u64 },
    /// A block was committed to the ledger.
    BlockCommitted(Block),
    /// An approved-but-inapplicable block was rejected at commit time.
    BlockRejected { round: u64 },
    /// A checkpoint was captured and persisted.
    CheckpointCreated(Checkpoint),
    /// The state machine entered RECOVERY.
    EnteredRecovery { round: u64, reason: String },
    /// RECOVERY completed and normal rounds resume.
    RecoveryResumed { round: u64 },
}
