//! The period clock: which period is active and when it changes.
//!
//! States: `Active(k)` for `k` in `0..total_periods`, then `Terminal`, then
//! `Destroyed`. The clock is evaluated lazily at the top of operations:
//!
//! 1. `elapsed = now - last_boundary`; nothing happens while
//!    `elapsed < period_duration`.
//! 2. Otherwise `k = (now - genesis) / period_duration`. If `k` is still a
//!    scheduled period the clock jumps straight to it, recomputes the rate
//!    and stamps the period record with `start = now`. Periods strictly
//!    between the previous one and `k` are jumped over.
//! 3. If `k >= total_periods` the clock becomes `Terminal` and the rate drops
//!    to zero.
//!
//! `Terminal -> Destroyed` is never taken here; the controller performs it as
//! an explicit operation.

use std::ops::Range;

use tracing::info;
use trickle_core::constants::RATIO_PRECISION;
use trickle_core::error::ArithmeticError;
use trickle_core::schedule::{period_of, period_start, scaled_ratio, seconds_until};
use trickle_core::store::RewardStore;
use trickle_core::traits::EmissionSchedule;
use trickle_core::types::{ClockPhase, ControllerState, EmissionParams, Period, SkippedPeriodPolicy};

/// Outcome of evaluating the clock at an instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// No boundary crossed.
    Stay,
    /// Enter `period`; `skipped` lists the periods jumped over (possibly empty).
    Enter { period: u64, skipped: Range<u64> },
    /// The schedule is over.
    Terminal,
}

/// Period clock over immutable emission parameters.
#[derive(Debug, Clone, Copy)]
pub struct PeriodClock {
    genesis: u64,
    duration: u64,
    total_periods: u64,
}

impl PeriodClock {
    pub fn new(params: &EmissionParams) -> Self {
        Self {
            genesis: params.genesis,
            duration: params.period_duration,
            total_periods: params.total_periods,
        }
    }

    pub fn genesis(&self) -> u64 {
        self.genesis
    }

    pub fn duration(&self) -> u64 {
        self.duration
    }

    pub fn total_periods(&self) -> u64 {
        self.total_periods
    }

    /// Instant at which the last scheduled period ends.
    pub fn terminal_time(&self) -> u64 {
        period_start(self.genesis, self.duration, self.total_periods)
    }

    /// Evaluate the transition rule at `now` without changing anything.
    pub fn advance(&self, state: &ControllerState, now: u64) -> Transition {
        if !matches!(state.phase, ClockPhase::Active(_)) {
            return Transition::Stay;
        }
        let elapsed = now.saturating_sub(state.last_boundary);
        if elapsed < self.duration {
            return Transition::Stay;
        }
        let period = period_of(self.genesis, self.duration, now);
        if period >= self.total_periods {
            return Transition::Terminal;
        }
        if period <= state.current_period {
            return Transition::Stay;
        }
        Transition::Enter {
            period,
            skipped: state.current_period + 1..period,
        }
    }

    /// Record for a period entered at `now`.
    pub fn entered_record(&self, index: u64, now: u64, rate: u128, budget: u128) -> Period {
        Period {
            index,
            rate,
            budget,
            claimed: 0,
            start: now,
            end: now.saturating_add(self.duration),
            skipped: false,
        }
    }

    /// Record for a period the clock jumped over, stamped at its scheduled times.
    pub fn skipped_record(&self, index: u64, rate: u128, budget: u128) -> Period {
        let start = period_start(self.genesis, self.duration, index);
        Period {
            index,
            rate,
            budget,
            claimed: 0,
            start,
            end: start.saturating_add(self.duration),
            skipped: true,
        }
    }

    /// Record for period 0, written at construction.
    pub fn genesis_record(&self, rate: u128, budget: u128) -> Period {
        self.entered_record(0, self.genesis, rate, budget)
    }

    /// Apply a transition to the store: new rate, period records, clock state.
    ///
    /// The caller must already have accrued every pool up to `now` at the old
    /// rate. Returns the entered period's record, or `None` for `Stay` and
    /// `Terminal`.
    pub fn apply<S: RewardStore + ?Sized>(
        &self,
        transition: &Transition,
        store: &mut S,
        schedule: &dyn EmissionSchedule,
        policy: SkippedPeriodPolicy,
        now: u64,
    ) -> Result<Option<Period>, ArithmeticError> {
        match transition {
            Transition::Stay => Ok(None),
            Transition::Enter { period, skipped } => {
                if policy == SkippedPeriodPolicy::Backfill {
                    for index in skipped.clone() {
                        let record = self.skipped_record(
                            index,
                            schedule.rate(index)?,
                            schedule.period_reward(index)?,
                        );
                        store.put_period(record);
                    }
                }
                let rate = schedule.rate(*period)?;
                let record = self.entered_record(*period, now, rate, schedule.period_reward(*period)?);
                store.put_period(record.clone());

                let mut state = store.state().clone();
                state.phase = ClockPhase::Active(*period);
                state.current_period = *period;
                state.current_rate = rate;
                state.last_boundary = now;
                store.set_state(state);

                info!(
                    period,
                    skipped = skipped.end - skipped.start,
                    rate,
                    budget = record.budget,
                    "clock: entered period"
                );
                Ok(Some(record))
            }
            Transition::Terminal => {
                let mut state = store.state().clone();
                state.phase = ClockPhase::Terminal;
                state.current_rate = 0;
                state.last_boundary = now;
                store.set_state(state);
                info!(now, "clock: schedule complete, terminal");
                Ok(None)
            }
        }
    }

    /// Seconds until the next boundary can be crossed. `None` once terminal.
    pub fn time_to_next_boundary(&self, state: &ControllerState, now: u64) -> Option<u64> {
        match state.phase {
            ClockPhase::Active(_) => Some(seconds_until(
                now,
                state.last_boundary.saturating_add(self.duration),
            )),
            ClockPhase::Terminal | ClockPhase::Destroyed => None,
        }
    }

    /// Seconds until the schedule ends.
    pub fn time_to_terminal(&self, now: u64) -> u64 {
        seconds_until(now, self.terminal_time())
    }

    /// Progress through the current period, scaled by `RATIO_PRECISION`.
    pub fn period_progress(&self, state: &ControllerState, now: u64) -> u64 {
        match state.phase {
            ClockPhase::Active(_) => scaled_ratio(
                now.saturating_sub(state.last_boundary),
                self.duration,
                RATIO_PRECISION,
            ),
            ClockPhase::Terminal | ClockPhase::Destroyed => RATIO_PRECISION,
        }
    }

    /// Progress through the whole schedule, scaled by `RATIO_PRECISION`.
    pub fn overall_progress(&self, now: u64) -> u64 {
        scaled_ratio(
            now.saturating_sub(self.genesis),
            self.terminal_time() - self.genesis,
            RATIO_PRECISION,
        )
    }
}
