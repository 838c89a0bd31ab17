//! In-process multi-node consensus tests for the PoA node stack.
//!
//! These exercise `poa-consensus`/`poa-ledger`/`poa-mempool`/`poa-fault`
//! directly, one `ConsensusEngine` + `LedgerEngine` per simulated
//! validator, with messages (proposals, votes) passed by hand between
//! them. No real networking, no real clock, no spawned process — the
//! boundary scenarios from the testable-properties list, driven
//! deterministically.

use std::collections::BTreeMap;

use poa_core::account::AccountState;
use poa_core::config::NodeConfig;
use poa_core::transaction::Transaction;
use poa_core::types::{Address, Amount, Hash256};
use poa_core::validator::{HealthStatus, ValidatorSet};
use poa_consensus::{ConsensusEngine, ConsensusError, ConsensusEvent};
use poa_crypto::{canonical_bytes, hash, KeyPair};
use poa_fault::{Accusation, ByzantineTracker, Offense};
use poa_genesis::GenesisConfig;
use poa_ledger::LedgerEngine;
use poa_mempool::Mempool;
use poa_validation::{validate_transaction, AccountStateView, ValidationError};

const NOW_MS: i64 = 1_700_000_000_000;
const NOW_SECS: i64 = NOW_MS / 1000;

/// `n` validator keypairs plus a freshly opened, genesis-initialized
/// ledger for each, all agreeing on the same genesis block.
struct Cluster {
    keypairs: Vec<KeyPair>,
    ledgers: Vec<(tempfile::TempDir, LedgerEngine)>,
    cfg: NodeConfig,
}

impl Cluster {
    fn new(n: usize, extra_alloc: Vec<(Address, Amount)>) -> Self {
        let keypairs: Vec<KeyPair> = (0..n).map(|_| KeyPair::generate()).collect();

        let mut alloc: BTreeMap<Address, AccountState> = BTreeMap::new();
        for kp in &keypairs {
            alloc.insert(kp.address, AccountState::new(Amount::ZERO));
        }
        for (addr, balance) in extra_alloc {
            alloc.insert(addr, AccountState::new(balance));
        }

        let config = GenesisConfig {
            timestamp: NOW_SECS,
            gas_limit: 12_000_000,
            extra_data: Vec::new(),
            alloc,
        };

        let ledgers: Vec<(tempfile::TempDir, LedgerEngine)> = (0..n)
            .map(|_| {
                let dir = tempfile::tempdir().unwrap();
                let ledger = LedgerEngine::open(dir.path()).unwrap();
                poa_genesis::apply_genesis(&ledger, &config).unwrap();
                (dir, ledger)
            })
            .collect();

        let cfg = NodeConfig::default();
        Self { keypairs, ledgers, cfg }
    }

    fn addresses(&self) -> Vec<Address> {
        self.keypairs.iter().map(|kp| kp.address).collect()
    }

    fn engines(&self) -> Vec<ConsensusEngine> {
        let members = self.addresses();
        self.keypairs
            .iter()
            .map(|kp| ConsensusEngine::new(ValidatorSet::new(members.clone(), NOW_MS), self.cfg.clone(), kp.address, NOW_MS))
            .collect()
    }

    fn ledger(&self, i: usize) -> &LedgerEngine {
        &self.ledgers[i].1
    }
}

fn signed_transfer(kp: &KeyPair, to: Address, value: Amount, nonce: u64, now_ms: i64, cfg: &NodeConfig) -> Transaction {
    let mut tx = Transaction {
        from: kp.address,
        to,
        value,
        data: Vec::new(),
        nonce,
        gas_limit: 21_000,
        gas_price: cfg.min_gas_price,
        timestamp: now_ms,
        signature: Vec::new(),
        hash: Hash256::ZERO,
    };
    let canonical = canonical_bytes(&tx.body()).unwrap();
    tx.hash = hash(&canonical);
    tx.signature = kp.sign(&canonical);
    tx
}

/// Drive one proposal through an `n`-node cluster to a committed block.
fn run_one_round(cluster: &Cluster, engines: &mut [ConsensusEngine], mempools: &mut [Mempool]) -> usize {
    let n = engines.len();
    let proposer = (0..n).find(|&i| engines[i].is_self_proposer()).expect("a proposer exists");
    // Genesis carries `NOW_SECS`; the new block's timestamp must be
    // strictly later than its parent's.
    let block_secs = NOW_SECS + 1;

    let propose_events = engines[proposer]
        .propose(cluster.ledger(proposer), &mut mempools[proposer], &cluster.keypairs[proposer], NOW_MS, block_secs)
        .unwrap();
    let block = match &propose_events[0] {
        ConsensusEvent::ProposalMade(b) => b.clone(),
        other => panic!("expected ProposalMade, got {other:?}"),
    };

    let mut votes = Vec::new();
    for event in &propose_events {
        if let ConsensusEvent::EnteredVoting { own_vote, .. } = event {
            votes.push(own_vote.clone());
        }
    }

    for (i, engine) in engines.iter_mut().enumerate() {
        if i == proposer {
            continue;
        }
        let events = engine
            .receive_proposal(block.clone(), cluster.ledger(i), Some(&cluster.keypairs[i]), NOW_MS)
            .unwrap();
        for event in events {
            if let ConsensusEvent::EnteredVoting { own_vote, .. } = event {
                votes.push(own_vote);
            }
        }
    }

    // Every vote reaches every engine, including the proposer's own engine
    // re-observing votes it already recorded (harmless: repeated identical
    // votes are a no-op in `receive_vote`).
    for engine in engines.iter_mut() {
        for vote in &votes {
            let _ = engine.receive_vote(vote.clone(), NOW_MS);
        }
    }

    for (i, engine) in engines.iter_mut().enumerate() {
        let events = engine.commit(cluster.ledger(i), &mut mempools[i], NOW_MS, block_secs).unwrap();
        assert!(
            events.iter().any(|e| matches!(e, ConsensusEvent::BlockCommitted(_))),
            "engine {i} did not commit the approved block"
        );
    }

    proposer
}

#[test]
fn happy_path_commits_block_across_quorum() {
    let sender_kp = KeyPair::generate();
    let recipient = KeyPair::generate().address;
    let cluster = Cluster::new(4, vec![
        (sender_kp.address, Amount::from_u64(1_000_000)),
        (recipient, Amount::ZERO),
    ]);
    let mut engines = cluster.engines();
    let mut mempools: Vec<Mempool> = (0..4).map(|_| Mempool::new(cluster.cfg.clone())).collect();

    let proposer = (0..4).find(|&i| engines[i].is_self_proposer()).unwrap();
    let tx = signed_transfer(&sender_kp, recipient, Amount::from_u64(100), 0, NOW_MS, &cluster.cfg);
    mempools[proposer].admit(tx, NOW_MS).unwrap();

    run_one_round(&cluster, &mut engines, &mut mempools);

    for i in 0..4 {
        let ledger = cluster.ledger(i);
        assert_eq!(ledger.block_count(), 2, "ledger {i} should have committed block 1");
        let sender_state = ledger.account(&sender_kp.address).unwrap().unwrap();
        assert_eq!(sender_state.nonce, 1);
        assert_eq!(sender_state.balance, Amount::from_u64(1_000_000 - 100 - 21_000));
        let recipient_state = ledger.account(&recipient).unwrap().unwrap();
        assert_eq!(recipient_state.balance, Amount::from_u64(100));
    }
}

#[test]
fn nonce_gap_is_admitted_to_pool_but_rejected_at_apply_time() {
    let sender_kp = KeyPair::generate();
    let recipient = KeyPair::generate().address;
    let cfg = NodeConfig::default();
    let mut pool = Mempool::new(cfg.clone());

    // expectedNonce starts at 0; a gap (nonce 5) is not `< expected`, so
    // the mempool admits it — it just can never be selected into a valid
    // block until the gap is filled.
    let gapped = signed_transfer(&sender_kp, recipient, Amount::from_u64(10), 5, NOW_MS, &cfg);
    pool.admit(gapped.clone(), NOW_MS).unwrap();
    assert_eq!(pool.len(), 1);

    struct View {
        sender: AccountState,
        recipient: AccountState,
        sender_addr: Address,
        recipient_addr: Address,
    }
    impl AccountStateView for View {
        fn account(&self, address: &Address) -> Option<AccountState> {
            if *address == self.sender_addr {
                Some(self.sender.clone())
            } else if *address == self.recipient_addr {
                Some(self.recipient.clone())
            } else {
                None
            }
        }
        fn is_processed(&self, _from: &Address, _nonce: u64) -> bool {
            false
        }
    }
    let view = View {
        sender: AccountState::new(Amount::from_u64(1_000_000)),
        recipient: AccountState::new(Amount::ZERO),
        sender_addr: sender_kp.address,
        recipient_addr: recipient,
    };

    assert!(matches!(
        validate_transaction(&gapped, &view, &cfg, NOW_MS),
        Err(ValidationError::NonceMismatch { expected: 0, got: 5 })
    ));
}

#[test]
fn replay_of_an_already_processed_nonce_is_rejected() {
    let sender_kp = KeyPair::generate();
    let recipient = KeyPair::generate().address;
    let cfg = NodeConfig::default();
    let tx = signed_transfer(&sender_kp, recipient, Amount::from_u64(10), 0, NOW_MS, &cfg);

    struct ReplayedView {
        sender_addr: Address,
        recipient_addr: Address,
    }
    impl AccountStateView for ReplayedView {
        fn account(&self, address: &Address) -> Option<AccountState> {
            if *address == self.sender_addr || *address == self.recipient_addr {
                Some(AccountState::new(Amount::from_u64(1_000_000)))
            } else {
                None
            }
        }
        fn is_processed(&self, from: &Address, nonce: u64) -> bool {
            *from == self.sender_addr && nonce == 0
        }
    }
    let view = ReplayedView {
        sender_addr: sender_kp.address,
        recipient_addr: recipient,
    };

    assert!(matches!(
        validate_transaction(&tx, &view, &cfg, NOW_MS),
        Err(ValidationError::ReplayDetected { .. })
    ));
}

#[test]
fn double_sign_equivocation_is_detected_and_jails_the_offender() {
    let cluster = Cluster::new(4, Vec::new());
    let mut engines = cluster.engines();
    let mut mempools: Vec<Mempool> = (0..4).map(|_| Mempool::new(cluster.cfg.clone())).collect();

    let proposer = (0..4).find(|&i| engines[i].is_self_proposer()).unwrap();
    let equivocator = (0..4).find(|&i| i != proposer).unwrap();
    let voter = (0..4).find(|&i| i != proposer && i != equivocator).unwrap();

    let propose_events = engines[proposer]
        .propose(cluster.ledger(proposer), &mut mempools[proposer], &cluster.keypairs[proposer], NOW_MS, NOW_SECS)
        .unwrap();
    let block = match &propose_events[0] {
        ConsensusEvent::ProposalMade(b) => b.clone(),
        other => panic!("expected ProposalMade, got {other:?}"),
    };

    engines[voter]
        .receive_proposal(block.clone(), cluster.ledger(voter), Some(&cluster.keypairs[voter]), NOW_MS)
        .unwrap();

    // The equivocator enters voting honestly first and that real vote
    // lands at `voter`, then a conflicting vote for the same round
    // arrives — the vote-level equivocation case this offense covers.
    let equivocator_events = engines[equivocator]
        .receive_proposal(block.clone(), cluster.ledger(equivocator), Some(&cluster.keypairs[equivocator]), NOW_MS)
        .unwrap();
    let genuine_vote = equivocator_events
        .iter()
        .find_map(|e| match e {
            ConsensusEvent::EnteredVoting { own_vote, .. } => Some(own_vote.clone()),
            _ => None,
        })
        .unwrap();
    engines[voter].receive_vote(genuine_vote, NOW_MS).unwrap();

    let conflicting_vote = poa_core::consensus::Vote {
        validator: cluster.keypairs[equivocator].address,
        block_hash: Hash256::ZERO,
        decision: false,
        round_number: 0,
        timestamp: NOW_MS,
        signature: cluster.keypairs[equivocator].sign(&poa_core::consensus::Vote::signing_bytes(&Hash256::ZERO, 0, false)),
    };

    let result = engines[voter].receive_vote(conflicting_vote, NOW_MS);
    let (offender, round) = match result {
        Err(ConsensusError::Equivocation { validator, round }) => (validator, round),
        other => panic!("expected Equivocation, got {other:?}"),
    };
    assert_eq!(offender, cluster.keypairs[equivocator].address);

    let cfg = NodeConfig {
        accusation_threshold: 1,
        ..cluster.cfg.clone()
    };
    let mut tracker = ByzantineTracker::new();
    let accusation = Accusation {
        offender,
        offense: Offense::Equivocation,
        round,
        accuser: cluster.keypairs[voter].address,
        timestamp: NOW_MS,
    };
    let jail = tracker
        .accuse(accusation, &cfg, engines[voter].validators_mut(), NOW_MS)
        .expect("single accusation should jail with threshold 1");
    assert_eq!(jail.offender, offender);
    assert!(engines[voter].validators().health(&offender).unwrap().is_jailed(NOW_MS));
}

#[test]
fn partition_minority_is_detected_when_validators_go_silent() {
    let cluster = Cluster::new(7, Vec::new());
    let mut engines = cluster.engines();
    // Fail 5 of 7: 2 remain active, ceil(2*7/3) = 5, so 2 < 5 is a partition.
    let members = cluster.addresses();
    for addr in members.iter().skip(2) {
        engines[0].validators_mut().health_mut(addr).unwrap().status = HealthStatus::Failed;
    }
    let status = poa_fault::detect_partition(engines[0].validators(), NOW_MS);
    assert!(status.is_partitioned());
    assert_eq!(status.active, 2);
}

#[test]
fn proposer_timeout_suspects_the_proposer() {
    let cluster = Cluster::new(4, Vec::new());
    let mut engines = cluster.engines();

    let proposer = (0..4).find(|&i| engines[i].is_self_proposer()).unwrap();
    let observer = (0..4).find(|&i| i != proposer).unwrap();

    let deadline = engines[observer].current_round().deadline;
    let events = engines[observer].check_timeouts(deadline + 1);
    assert!(matches!(
        events.as_slice(),
        [ConsensusEvent::ProposerSuspected { validator, .. }] if *validator == cluster.keypairs[proposer].address
    ));
}

#[test]
fn consecutive_round_failures_eventually_trigger_recovery() {
    let cluster = Cluster::new(4, Vec::new());
    let cfg = NodeConfig {
        max_failed_rounds: 2,
        ..cluster.cfg.clone()
    };
    let members = cluster.addresses();
    let mut engine = ConsensusEngine::new(ValidatorSet::new(members, NOW_MS), cfg, cluster.keypairs[0].address, NOW_MS);
    let mut mempool = Mempool::new(NodeConfig::default());

    assert!(engine.needs_recovery().is_none());
    for round in 0..2 {
        let now = NOW_MS + (round + 1) * 10_000;
        let deadline = engine.current_round().deadline;
        engine.check_timeouts(deadline + 1);
        engine.commit(cluster.ledger(0), &mut mempool, now, NOW_SECS).unwrap();
    }
    assert!(engine.needs_recovery().is_some());
}
