use poa_core::config::NodeConfig;
use poa_core::constants::{MIN_GAS_LIMIT, TX_TIMESTAMP_FUTURE_MS, TX_TIMESTAMP_PAST_MS};
use poa_core::transaction::Transaction;
use poa_core::types::{Amount, TimestampMs};
use poa_crypto::{canonical_bytes, hash, verify_bound};

use crate::error::ValidationError;
use crate::view::AccountStateView;

/// Steps 1–3 and 5 of `validateTransaction`: structural completeness,
/// hash integrity, signature/address binding, and gas/data bounds. This is
/// the subset the mempool runs at admission time (§4.4 "Admit"), before
/// any account-state view is available; the full `validateTransaction`
/// below reuses it and then layers the state-dependent checks on top.
pub fn validate_transaction_structural(
    tx: &Transaction,
    cfg: &NodeConfig,
    now: TimestampMs,
) -> Result<Vec<u8>, ValidationError> {
    // 1. Structural completeness and field ranges.
    if tx.timestamp < now - TX_TIMESTAMP_PAST_MS || tx.timestamp > now + TX_TIMESTAMP_FUTURE_MS {
        return Err(ValidationError::MissingField("timestamp outside allowed band"));
    }
    if tx.data.len() > cfg.max_data_size_bytes {
        return Err(ValidationError::DataTooLarge {
            len: tx.data.len(),
            max: cfg.max_data_size_bytes,
        });
    }

    // 2. hash == H(canonical(payload)).
    let body = tx.body();
    let canonical = canonical_bytes(&body).map_err(|e| ValidationError::InvalidSignature(e.to_string()))?;
    let computed = hash(&canonical);
    if computed != tx.hash {
        return Err(ValidationError::HashMismatch {
            expected: tx.hash,
            computed,
        });
    }

    // 3. Signature verification with address binding. The signature covers
    // the canonical payload, not the already-reduced `tx.hash` — `H` is
    // applied internally by `sign`/`verify` to produce the secp256k1 digest.
    verify_bound(&canonical, &tx.signature, &tx.from)
        .map_err(|e| ValidationError::InvalidSignature(e.to_string()))?;

    // 5. Gas/value/data bounds.
    if tx.gas_price < cfg.min_gas_price || tx.gas_price > cfg.max_gas_price {
        return Err(ValidationError::GasPriceOutOfRange {
            price: tx.gas_price.to_string(),
            min: cfg.min_gas_price.to_string(),
            max: cfg.max_gas_price.to_string(),
        });
    }
    if tx.gas_limit < MIN_GAS_LIMIT || tx.gas_limit > cfg.max_gas_limit {
        return Err(ValidationError::GasLimitOutOfRange {
            limit: tx.gas_limit,
            min: MIN_GAS_LIMIT,
            max: cfg.max_gas_limit,
        });
    }

    Ok(canonical)
}

/// `validateTransaction(tx, accountStateView) → Result` (§4.2).
///
/// Checks run in order and the first failure is returned; no check past
/// the failing one runs, and none has a side effect.
pub fn validate_transaction(
    tx: &Transaction,
    view: &impl AccountStateView,
    cfg: &NodeConfig,
    now: TimestampMs,
) -> Result<(), ValidationError> {
    validate_transaction_structural(tx, cfg, now)?;

    // 4. Sender/recipient existence.
    let sender = view
        .account(&tx.from)
        .ok_or(ValidationError::UnknownSender(tx.from))?;
    view.account(&tx.to).ok_or(ValidationError::UnknownRecipient(tx.to))?;

    // 6. Balance >= value + gasLimit * gasPrice.
    let fee = tx
        .gas_price
        .checked_mul(Amount::from_u64(tx.gas_limit))
        .ok_or_else(|| ValidationError::ValueOutOfRange(tx.gas_price.to_string()))?;
    let required = tx
        .value
        .checked_add(fee)
        .ok_or_else(|| ValidationError::ValueOutOfRange(tx.value.to_string()))?;
    if sender.balance < required {
        return Err(ValidationError::InsufficientBalance {
            need: required.to_string(),
            have: sender.balance.to_string(),
        });
    }

    // 7. Strict nonce equality.
    if tx.nonce != sender.nonce {
        return Err(ValidationError::NonceMismatch {
            expected: sender.nonce,
            got: tx.nonce,
        });
    }

    // 8. Replay guard.
    if view.is_processed(&tx.from, tx.nonce) {
        return Err(ValidationError::ReplayDetected {
            from: tx.from,
            nonce: tx.nonce,
        });
    }

    // 9. Business rules.
    if tx.from == tx.to {
        return Err(ValidationError::SelfTransfer(tx.from));
    }
    if tx.value.is_zero() && tx.data.is_empty() {
        return Err(ValidationError::ZeroValueNoData);
    }

    Ok(())
}
