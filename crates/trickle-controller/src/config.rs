//! Controller configuration.
//!
//! [`ControllerConfig`] carries the deployment constants with defaults matching
//! the reference deployment. It can be built programmatically or loaded with
//! [`ControllerConfig::load`] from an optional TOML file layered under
//! `TRICKLE_*` environment variables.
//!
//! An unset `genesis_time` starts period 0 when the config is loaded or the
//! controller is created, whichever comes first.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use trickle_core::constants::{
    BPS_PRECISION, CURVE_PRECISION, DEFAULT_DECAY_BPS, DEFAULT_MAX_POOLS, DEFAULT_PERIOD_SECS,
    DEFAULT_RATE_CEILING, DEFAULT_TOTAL_BUDGET_TOKENS, DEFAULT_TOTAL_PERIODS, UNIT,
};
use trickle_core::error::ConfigError;
use trickle_core::traits::EmissionSchedule;
use trickle_core::types::{EmissionParams, SkippedPeriodPolicy, TerminationPolicy};
use trickle_emission::EmissionCurve;

/// Environment variable prefix for overrides (`TRICKLE_TOTAL_PERIODS=24`).
pub const ENV_PREFIX: &str = "TRICKLE";

/// Configuration for one reward controller deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Lifetime budget in whole tokens.
    pub total_budget_tokens: u64,
    /// Per-period decay in basis points.
    pub decay_bps: u64,
    pub total_periods: u64,
    pub period_secs: u64,
    /// Unix time at which period 0 starts. `None` means "now".
    pub genesis_time: Option<u64>,
    /// Ceiling on the per-second rate, in base units.
    pub rate_ceiling: u64,
    pub termination_policy: TerminationPolicy,
    pub skipped_period_policy: SkippedPeriodPolicy,
    /// Registration ceiling; bounds the mass update run at period boundaries.
    pub max_pools: usize,
    /// Log level filter string (e.g. "info", "debug", "trickle_ledger=trace").
    pub log_level: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            total_budget_tokens: DEFAULT_TOTAL_BUDGET_TOKENS,
            decay_bps: DEFAULT_DECAY_BPS,
            total_periods: DEFAULT_TOTAL_PERIODS,
            period_secs: DEFAULT_PERIOD_SECS,
            genesis_time: None,
            rate_ceiling: DEFAULT_RATE_CEILING as u64,
            termination_policy: TerminationPolicy::default(),
            skipped_period_policy: SkippedPeriodPolicy::default(),
            max_pools: DEFAULT_MAX_POOLS,
            log_level: "info".to_string(),
        }
    }
}

/// Current Unix time in seconds.
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

impl ControllerConfig {
    /// Default config file: `<config dir>/trickle/trickle.toml`.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("trickle")
            .join("trickle.toml")
    }

    /// Load from `path` (or [`default_path`](Self::default_path)) with
    /// environment overrides. A missing file falls back to the defaults, and
    /// an unset genesis is pinned to the current time.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(Self::default_path);
        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        let mut cfg: Self = settings
            .try_deserialize()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        cfg.genesis_time.get_or_insert_with(unix_now);
        cfg.validate()?;
        Ok(cfg)
    }

    /// Genesis time, reading an unset value as the current time.
    pub fn genesis(&self) -> u64 {
        self.genesis_time.unwrap_or_else(unix_now)
    }

    /// Emission parameters in base units and curve fixed-point.
    pub fn emission_params(&self) -> Result<EmissionParams, ConfigError> {
        if self.decay_bps == 0 || self.decay_bps >= BPS_PRECISION {
            return Err(ConfigError::InvalidDecay(
                self.decay_bps as u128 * CURVE_PRECISION / BPS_PRECISION as u128,
            ));
        }
        let total_budget = (self.total_budget_tokens as u128)
            .checked_mul(UNIT)
            .ok_or_else(|| ConfigError::Invalid("total budget overflows".to_string()))?;
        Ok(EmissionParams {
            total_budget,
            decay: self.decay_bps as u128 * CURVE_PRECISION / BPS_PRECISION as u128,
            total_periods: self.total_periods,
            period_duration: self.period_secs,
            genesis: self.genesis(),
        })
    }

    /// Build the emission curve and check its opening rate against the ceiling.
    pub fn curve(&self) -> Result<EmissionCurve, ConfigError> {
        let curve = EmissionCurve::new(self.emission_params()?)?;
        let rate = curve
            .rate(0)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if rate > self.rate_ceiling as u128 {
            return Err(ConfigError::RateAboveCeiling {
                rate,
                ceiling: self.rate_ceiling as u128,
            });
        }
        Ok(curve)
    }

    /// Check every constraint without keeping the curve.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_pools == 0 {
            return Err(ConfigError::Invalid("max_pools must be non-zero".to_string()));
        }
        self.curve().map(|_| ())
    }
}
