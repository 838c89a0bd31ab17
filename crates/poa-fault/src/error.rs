use poa_core::types::Address;
use thiserror::Error;

/// `FaultError` (§7): detected loss of liveness or safety margin. These
/// switch the consensus phase to RECOVERY; they never abort the node.
#[derive(Debug, Error)]
pub enum FaultError {
    #[error("partition detected: only {active} of {total} validators active, need {needed}")]
    PartitionDetected {
        active: usize,
        total: usize,
        needed: usize,
    },

    #[error("quorum lost: {available} available, {needed} needed")]
    QuorumLost { available: usize, needed: usize },

    #[error("recovery timed out after {elapsed_ms}ms")]
    RecoveryTimeout { elapsed_ms: u64 },

    #[error("accusation against {validator} references unknown round {round}")]
    UnknownRound { validator: Address, round: u64 },
}
