//! Period arithmetic on wall-clock seconds.
//!
//! Periods are fixed-length windows counted from genesis:
//! - Period 0: `[genesis, genesis + duration)`
//! - Period 1: `[genesis + duration, genesis + 2 * duration)`
//! - …
//! - Period `total - 1` ends at the terminal time; later instants belong to
//!   no period.
//!
//! All helpers take the duration as a parameter so the same arithmetic serves
//! every deployment.

/// Which period an instant falls in, by direct division from genesis.
///
/// Instants before genesis count as period 0. `duration` must be non-zero.
pub fn period_of(genesis: u64, duration: u64, now: u64) -> u64 {
    now.saturating_sub(genesis) / duration
}

/// The first instant of `period`.
///
/// Saturates instead of overflowing for absurd period indices.
pub fn period_start(genesis: u64, duration: u64, period: u64) -> u64 {
    genesis.saturating_add(period.saturating_mul(duration))
}

/// Seconds from `now` until `target`, or 0 once `target` has passed.
pub fn seconds_until(now: u64, target: u64) -> u64 {
    target.saturating_sub(now)
}

/// `numerator / denominator` as a ratio scaled by `precision`, clamped to
/// `[0, precision]`. A zero denominator counts as complete.
pub fn scaled_ratio(numerator: u64, denominator: u64, precision: u64) -> u64 {
    if denominator == 0 || numerator >= denominator {
        return precision;
    }
    ((numerator as u128 * precision as u128) / denominator as u128) as u64
}
