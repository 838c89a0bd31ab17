use poa_core::consensus::RoundPhase;
use poa_core::types::Address;
use poa_ledger::LedgerError;
use poa_validation::ValidationError;
use thiserror::Error;

/// `ConsensusError` (§7): a round-local failure. Every variant terminates
/// the current round and advances rather than aborting the node — only
/// [`ConsensusError::Fatal`] propagates further, matching the "only
/// FatalError halts" propagation policy.
#[derive(Debug, Error)]
pub enum ConsensusError {
    #[error("round {round}: message arrived in phase {phase:?}, not expected for this operation")]
    UnexpectedPhase { round: u64, phase: RoundPhase },

    #[error("round {round}: proposal from {got}, expected proposer {expected}")]
    InvalidProposer {
        round: u64,
        expected: Address,
        got: Address,
    },

    #[error("round {round}: duplicate vote from {validator}")]
    DuplicateVote { validator: Address, round: u64 },

    #[error("round {round}: equivocating vote from {validator}")]
    Equivocation { validator: Address, round: u64 },

    #[error("vote for round {got}, current round is {current}")]
    StaleVote { current: u64, got: u64 },

    #[error("round {round} timed out in phase {phase:?}")]
    RoundTimeout { round: u64, phase: RoundPhase },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("state integrity violation after commit: {0}")]
    Fatal(String),
}
