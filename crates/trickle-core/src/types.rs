//! Core records: addresses, pools, positions, periods and controller state.
//!
//! Reward amounts, rates and shares are `u128` base units. The accumulator and
//! debt are 256-bit ([`crate::wide`]). Debt is signed because a position that
//! leaves a pool after the accumulator has grown keeps a negative baseline
//! (its unclaimed reward).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::wide::{SignedWide, Wide};

/// A 20-byte account or contract address.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
    bincode::Encode, bincode::Decode,
)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub const ZERO: Self = Self([0u8; 20]);

    /// Return the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// Error parsing an [`Address`] from its hex form.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressParseError {
    #[error("invalid hex: {0}")]
    Hex(String),
    #[error("expected 20 bytes, got {0}")]
    Length(usize),
}

impl FromStr for Address {
    type Err = AddressParseError;

    /// Parse `0x`-prefixed or bare 40-character hex.
    ///
    /// # Examples
    ///
    /// ```
    /// use trickle_core::types::Address;
    /// let addr: Address = "0x0101010101010101010101010101010101010101".parse().unwrap();
    /// assert_eq!(addr, Address([1; 20]));
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(stripped).map_err(|e| AddressParseError::Hex(e.to_string()))?;
        let array: [u8; 20] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| AddressParseError::Length(bytes.len()))?;
        Ok(Self(array))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// An asset the controller's treasury may hold.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash,
    bincode::Encode, bincode::Decode,
)]
#[serde(rename_all = "snake_case")]
pub enum Asset {
    /// The chain's native currency.
    Native,
    /// A token contract.
    Token(Address),
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native => f.write_str("native"),
            Self::Token(addr) => write!(f, "token:{addr}"),
        }
    }
}

/// Which side of a market a pool rewards.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord,
    bincode::Encode, bincode::Decode,
)]
#[serde(rename_all = "snake_case")]
pub enum PoolKind {
    Lend,
    Borrow,
}

impl fmt::Display for PoolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lend => f.write_str("lend"),
            Self::Borrow => f.write_str("borrow"),
        }
    }
}

/// Identity of a reward stream: one per (market, kind) pair.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord,
    bincode::Encode, bincode::Decode,
)]
pub struct PoolId {
    pub market: Address,
    pub kind: PoolKind,
}

impl PoolId {
    pub fn new(market: Address, kind: PoolKind) -> Self {
        Self { market, kind }
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.market, self.kind)
    }
}

/// Why a position tracker reported a balance change. Carried into logs only.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TrackContext {
    #[default]
    Adjust,
    Deposit,
    Withdraw,
    Liquidation,
    Transfer,
}

impl fmt::Display for TrackContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Adjust => "adjust",
            Self::Deposit => "deposit",
            Self::Withdraw => "withdraw",
            Self::Liquidation => "liquidation",
            Self::Transfer => "transfer",
        };
        f.write_str(s)
    }
}

/// Metadata for one emission period.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default,
    bincode::Encode, bincode::Decode,
)]
pub struct Period {
    pub index: u64,
    /// Units released per second while this period is active.
    pub rate: u128,
    /// Planned reward for this period; collections may never exceed it.
    pub budget: u128,
    /// Cumulative amount collected while this period was active.
    pub claimed: u128,
    pub start: u64,
    /// Estimated end (`start + period duration`).
    pub end: u64,
    /// Set when the record was backfilled for a period the clock jumped over.
    pub skipped: bool,
}

impl Period {
    /// Budget left before collections start failing.
    pub fn headroom(&self) -> u128 {
        self.budget.saturating_sub(self.claimed)
    }
}

/// A reward stream and its reward-per-share accumulator.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct Pool {
    pub id: PoolId,
    pub active: bool,
    pub weight: u128,
    pub total_shares: u128,
    /// Reward per share, scaled by [`ACC_PRECISION`](crate::constants::ACC_PRECISION).
    pub accumulator: Wide,
    pub last_update: u64,
    /// Total reward folded into the accumulator since registration.
    pub accrued: u128,
}

impl Pool {
    /// A freshly registered pool with no shares.
    pub fn new(id: PoolId, weight: u128, now: u64) -> Self {
        Self {
            id,
            active: true,
            weight,
            total_shares: 0,
            accumulator: Wide::ZERO,
            last_update: now,
            accrued: 0,
        }
    }
}

/// One participant's stake and settlement baseline within a pool.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default,
    bincode::Encode, bincode::Decode,
)]
pub struct Position {
    pub shares: u128,
    pub debt: SignedWide,
}

/// Where the period clock stands.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
#[serde(rename_all = "snake_case")]
pub enum ClockPhase {
    Active(u64),
    Terminal,
    Destroyed,
}

impl fmt::Display for ClockPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active(k) => write!(f, "active({k})"),
            Self::Terminal => f.write_str("terminal"),
            Self::Destroyed => f.write_str("destroyed"),
        }
    }
}

/// How termination is gated once the terminal period is reached.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TerminationPolicy {
    /// The admin must arm termination (one-way) before it may run.
    #[default]
    Armed,
    /// Termination may run as soon as the clock is terminal.
    Unconditional,
}

/// What the clock records for periods it jumps over.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SkippedPeriodPolicy {
    /// Skipped periods receive no record.
    #[default]
    Jump,
    /// Skipped periods receive a record at their scheduled times, marked `skipped`.
    Backfill,
}

/// Immutable emission parameters, fixed at deployment.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct EmissionParams {
    pub total_budget: u128,
    /// Per-period decay fraction, scaled by [`CURVE_PRECISION`](crate::constants::CURVE_PRECISION).
    pub decay: u128,
    pub total_periods: u64,
    pub period_duration: u64,
    pub genesis: u64,
}

impl EmissionParams {
    /// Instant at which the last period ends.
    pub fn terminal_time(&self) -> u64 {
        crate::schedule::period_start(self.genesis, self.period_duration, self.total_periods)
    }
}

/// Mutable controller-wide state.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct ControllerState {
    pub phase: ClockPhase,
    /// Index of the most recently entered period. Stays at the last index
    /// once the clock is terminal.
    pub current_period: u64,
    pub current_rate: u128,
    pub last_boundary: u64,
    pub total_weight: u128,
    pub termination_armed: bool,
    pub artificer: Option<Address>,
    pub total_claimed: u128,
}

impl ControllerState {
    /// State at genesis: period 0 active at `rate`.
    pub fn genesis(genesis: u64, rate: u128) -> Self {
        Self {
            phase: ClockPhase::Active(0),
            current_period: 0,
            current_rate: rate,
            last_boundary: genesis,
            total_weight: 0,
            termination_armed: false,
            artificer: None,
            total_claimed: 0,
        }
    }
}
