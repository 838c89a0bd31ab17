//! Protocol constants that are not operator-configurable — the ones fixed
//! by the wire contract rather than by `NodeConfig` (§6).

/// Minimum gas a transaction may declare.
pub const MIN_GAS_LIMIT: u64 = 21_000;

/// Gas cost per byte of `data`, used in the estimated-gas formula
/// `21000 + 68 * |data|` (§4.4).
pub const GAS_PER_DATA_BYTE: u64 = 68;

/// Transaction timestamp band, lower bound: `now - 1h`.
pub const TX_TIMESTAMP_PAST_MS: i64 = 3_600_000;

/// Transaction timestamp band, upper bound: `now + 5min`.
pub const TX_TIMESTAMP_FUTURE_MS: i64 = 300_000;

/// Block timestamp band, upper bound: `now + 60s`.
pub const BLOCK_TIMESTAMP_FUTURE_SECS: i64 = 60;

/// Byzantine-offense reputation slash weights (§4.6).
pub const SLASH_DOUBLE_SIGNING: f64 = 50.0;
pub const SLASH_EQUIVOCATION: f64 = 40.0;
pub const SLASH_INVALID_BLOCK: f64 = 30.0;
pub const SLASH_NON_PARTICIPATION: f64 = 10.0;

/// Consecutive failures before a validator is marked `FAILED` (§4.6).
pub const CONSECUTIVE_FAILURES_THRESHOLD: u32 = 3;

/// Participation-rate floor for the NON_PARTICIPATION offense (§4.6).
pub const MIN_PARTICIPATION_RATE: f64 = 0.5;

/// Default sliding window (in rounds) used to measure participation rate.
pub const PARTICIPATION_WINDOW_ROUNDS: usize = 20;
