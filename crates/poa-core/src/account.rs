//! The account record: a single closed struct, per §9's "duck-typed account
//! states" design note. Missing optional fields are absence, not defaults —
//! `code`/`storage` are `Option`, never synthesized.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{Amount, Nonce};

/// Full state of one account as tracked by the ledger.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AccountState {
    pub balance: Amount,
    pub nonce: Nonce,
    /// Present only for contract accounts. The core ledger never executes
    /// code (smart-contract execution is a stated non-goal) — this field
    /// is carried through unexamined so future layers can use it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<BTreeMap<String, String>>,
}

impl AccountState {
    pub fn new(balance: Amount) -> Self {
        Self {
            balance,
            nonce: 0,
            code: None,
            storage: None,
        }
    }
}

impl Default for AccountState {
    fn default() -> Self {
        Self::new(Amount::ZERO)
    }
}
