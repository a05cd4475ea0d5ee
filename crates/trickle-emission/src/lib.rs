//! # trickle-emission — Decaying emission curve and period clock.
//!
//! All calculations use integer arithmetic only for determinism.
//!
//! - **Emission curve**: a fixed budget released over a fixed number of
//!   periods, each period's reward a constant fraction smaller than the last.
//!   The schedule sums to the budget exactly.
//! - **Period clock**: lazy period transitions evaluated at the top of every
//!   operation, jumping over idle periods and ending in a terminal state.
//! - **Fixed-point helpers**: binary exponentiation and checked `a * b / c`.

pub mod clock;
pub mod curve;
pub mod fixed;

pub use clock::{PeriodClock, Transition};
pub use curve::{EmissionCurve, PeriodPlan};
