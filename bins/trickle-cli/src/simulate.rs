//! Scripted simulation against an in-memory controller.
//!
//! A script is a JSON document naming the admin and reward token, an optional
//! controller configuration, and a list of steps. Each step runs at the
//! simulated clock; `advance` and `at` move the clock.
//!
//! ```json
//! {
//!   "admin": "0xadadadadadadadadadadadadadadadadadadadad",
//!   "token": "0xeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee",
//!   "steps": [
//!     { "register": { "market": "0x0101010101010101010101010101010101010101", "kind": "lend", "weight": 1 } },
//!     { "track": { "market": "0x0101010101010101010101010101010101010101", "kind": "lend",
//!                  "participant": "0xa1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1", "balance": 1000 } },
//!     { "advance": { "secs": 86400 } },
//!     { "collect": { "market": "0x0101010101010101010101010101010101010101", "kind": "lend",
//!                    "participant": "0xa1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1" } }
//!   ]
//! }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;
use trickle_controller::boundary::{MemoryAdminRegistry, MemoryTokenAuthority, MemoryTreasury};
use trickle_controller::{Boundaries, ControllerConfig, RewardController};
use trickle_core::error::TrickleError;
use trickle_core::store::MemoryRewardStore;
use trickle_core::types::{
    Address, Asset, ClockPhase, ControllerState, Period, Pool, PoolId, PoolKind, TrackContext,
};

/// A simulation script.
#[derive(Debug, Deserialize)]
pub struct Script {
    pub admin: Address,
    pub token: Address,
    /// Replaces the loaded configuration when present.
    #[serde(default)]
    pub config: Option<ControllerConfig>,
    /// Native balance credited to the controller before the first step.
    #[serde(default)]
    pub treasury_native: u128,
    pub steps: Vec<Step>,
}

/// One scripted operation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Advance { secs: u64 },
    At { time: u64 },
    Register { market: Address, kind: PoolKind, weight: u128 },
    Adjust { market: Address, kind: PoolKind, weight: u128 },
    Track {
        market: Address,
        kind: PoolKind,
        participant: Address,
        balance: u128,
        #[serde(default)]
        context: TrackContext,
    },
    Collect {
        market: Address,
        kind: PoolKind,
        participant: Address,
        #[serde(default)]
        to: Option<Address>,
    },
    CollectAll {
        participant: Address,
        #[serde(default)]
        to: Option<Address>,
    },
    TrackAll,
    Override { rate: u128 },
    Arm,
    Terminate,
}

impl Step {
    fn name(&self) -> &'static str {
        match self {
            Self::Advance { .. } => "advance",
            Self::At { .. } => "at",
            Self::Register { .. } => "register",
            Self::Adjust { .. } => "adjust",
            Self::Track { .. } => "track",
            Self::Collect { .. } => "collect",
            Self::CollectAll { .. } => "collect_all",
            Self::TrackAll => "track_all",
            Self::Override { .. } => "override",
            Self::Arm => "arm",
            Self::Terminate => "terminate",
        }
    }
}

/// Outcome of one step.
#[derive(Debug, Serialize)]
pub struct StepOutcome {
    pub step: usize,
    pub op: &'static str,
    pub time: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<u128>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Final state after a script.
#[derive(Debug, Serialize)]
pub struct Report {
    pub phase: ClockPhase,
    pub current_period: u64,
    pub current_rate: u128,
    pub total_claimed: u128,
    pub total_minted: u128,
    pub periods: Vec<Period>,
    pub pools: Vec<Pool>,
    pub steps: Vec<StepOutcome>,
}

/// Run a script. Step failures are recorded in the report, not returned.
pub fn run(script: &Script, config: ControllerConfig) -> Result<(Report, MemoryRewardStore), TrickleError> {
    let time = Arc::new(AtomicU64::new(config.genesis()));
    let token = Arc::new(MemoryTokenAuthority::new(
        script.token,
        (config.total_budget_tokens as u128).saturating_mul(trickle_core::constants::UNIT),
    ));
    let treasury = Arc::new(MemoryTreasury::new());
    treasury.deposit(Asset::Native, script.treasury_native);
    let boundaries = Boundaries::new(
        token.clone(),
        Arc::new(MemoryAdminRegistry::new(script.admin)),
        treasury,
    );

    let clock = time.clone();
    let mut ctl = RewardController::with_clock(
        config,
        MemoryRewardStore::new(ControllerState::genesis(0, 0)),
        boundaries,
        move || clock.load(Ordering::SeqCst),
    )?;

    let mut outcomes = Vec::with_capacity(script.steps.len());
    for (index, step) in script.steps.iter().enumerate() {
        let result = apply(&mut ctl, &time, script.admin, step);
        let now = time.load(Ordering::SeqCst);
        info!(step = index, op = step.name(), time = now, ok = result.is_ok(), "simulate: step");
        let (amount, error) = match result {
            Ok(amount) => (amount, None),
            Err(e) => (None, Some(e.to_string())),
        };
        outcomes.push(StepOutcome { step: index, op: step.name(), time: now, amount, error });
    }

    let state = ctl.state().clone();
    let report = Report {
        phase: state.phase,
        current_period: state.current_period,
        current_rate: state.current_rate,
        total_claimed: state.total_claimed,
        total_minted: token.total_minted(),
        periods: ctl.store().periods(),
        pools: ctl.pools(),
        steps: outcomes,
    };
    Ok((report, ctl.into_store()))
}

fn apply(
    ctl: &mut RewardController<MemoryRewardStore>,
    time: &AtomicU64,
    admin: Address,
    step: &Step,
) -> Result<Option<u128>, TrickleError> {
    match step {
        Step::Advance { secs } => {
            time.fetch_add(*secs, Ordering::SeqCst);
            Ok(None)
        }
        Step::At { time: t } => {
            time.store(*t, Ordering::SeqCst);
            Ok(None)
        }
        Step::Register { market, kind, weight } => {
            ctl.register_pool(&admin, PoolId::new(*market, *kind), *weight)?;
            Ok(None)
        }
        Step::Adjust { market, kind, weight } => {
            ctl.adjust_weight(&admin, PoolId::new(*market, *kind), *weight)?;
            Ok(None)
        }
        Step::Track { market, kind, participant, balance, context } => {
            ctl.track(market, participant, *balance, *context, *kind)?;
            Ok(None)
        }
        Step::Collect { market, kind, participant, to } => {
            let to = to.unwrap_or(*participant);
            ctl.collect(participant, &PoolId::new(*market, *kind), &to).map(Some)
        }
        Step::CollectAll { participant, to } => {
            let to = to.unwrap_or(*participant);
            ctl.collect_all(participant, &to).map(Some)
        }
        Step::TrackAll => {
            ctl.track_all()?;
            Ok(None)
        }
        Step::Override { rate } => {
            ctl.override_rate(&admin, *rate)?;
            Ok(None)
        }
        Step::Arm => {
            ctl.arm_termination(&admin)?;
            Ok(None)
        }
        Step::Terminate => ctl.terminate(&admin).map(Some),
    }
}
