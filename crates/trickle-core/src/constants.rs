//! Protocol constants. All reward amounts in base units (1 token = 10^18 units).

/// Base units per whole reward token.
pub const UNIT: u128 = 1_000_000_000_000_000_000;

/// Fixed-point denominator of the reward-per-share accumulator.
pub const ACC_PRECISION: u128 = 1_000_000_000_000;

/// Fixed-point denominator of curve fractions (decay, released fraction).
///
/// # Examples
///
/// ```
/// use trickle_core::constants::{CURVE_PRECISION, BPS_PRECISION};
/// // 5.5% expressed as a curve fraction.
/// let decay = 550 * CURVE_PRECISION / BPS_PRECISION as u128;
/// assert_eq!(decay, 55_000_000_000);
/// ```
pub const CURVE_PRECISION: u128 = 1_000_000_000_000;

/// Fixed-point denominator of progress ratios reported by queries.
pub const RATIO_PRECISION: u64 = 1_000_000_000;

pub const BPS_PRECISION: u64 = 10_000;

pub const SECONDS_PER_DAY: u64 = 86_400;

/// Reference deployment: 3,000,000 tokens over 48 thirty-day periods.
pub const DEFAULT_TOTAL_BUDGET_TOKENS: u64 = 3_000_000;
pub const DEFAULT_TOTAL_PERIODS: u64 = 48;
pub const DEFAULT_DECAY_BPS: u64 = 550;
pub const DEFAULT_PERIOD_SECS: u64 = 30 * SECONDS_PER_DAY;

/// Default ceiling on the per-second emission rate: 0.1 token per second.
///
/// The reference schedule starts at roughly 0.068 token per second, so the
/// ceiling leaves headroom for a manual override without allowing a runaway
/// rate.
pub const DEFAULT_RATE_CEILING: u128 = UNIT / 10;

/// Default registration ceiling. Bounds the cost of the mass update that runs
/// whenever a period boundary is crossed.
pub const DEFAULT_MAX_POOLS: usize = 256;

/// Snapshot format version written in front of every encoded store.
pub const SNAPSHOT_VERSION: u32 = 2;
