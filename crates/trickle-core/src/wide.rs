//! 256-bit values stored in pool and position records.
//!
//! `shares * accumulator` routinely passes 128 bits (a dust holder early in a
//! period drives the accumulator up, then a large deposit multiplies it), so
//! the accumulator and the debt baseline are kept as 256-bit words. Both
//! serialize as decimal strings and encode as four little-endian `u64` limbs.

use std::cmp::Ordering;
use std::fmt;

pub use primitive_types::U256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// An unsigned 256-bit word.
#[derive(Clone, Copy, PartialEq, Eq, Hash, bincode::Encode, bincode::Decode)]
pub struct Wide([u64; 4]);

impl Wide {
    pub const ZERO: Self = Self([0; 4]);

    pub fn get(self) -> U256 {
        U256(self.0)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0; 4]
    }
}

impl Default for Wide {
    fn default() -> Self {
        Self::ZERO
    }
}

impl From<U256> for Wide {
    fn from(value: U256) -> Self {
        Self(value.0)
    }
}

impl From<u128> for Wide {
    fn from(value: u128) -> Self {
        Self::from(U256::from(value))
    }
}

impl PartialOrd for Wide {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Wide {
    fn cmp(&self, other: &Self) -> Ordering {
        self.get().cmp(&other.get())
    }
}

impl fmt::Display for Wide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

impl fmt::Debug for Wide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

impl Serialize for Wide {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Wide {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        U256::from_dec_str(&s)
            .map(Self::from)
            .map_err(|e| serde::de::Error::custom(format!("invalid 256-bit decimal {s:?}: {e:?}")))
    }
}

/// A signed 256-bit word kept as sign and magnitude. Zero is never negative.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, bincode::Encode, bincode::Decode)]
pub struct SignedWide {
    negative: bool,
    magnitude: Wide,
}

impl SignedWide {
    pub const ZERO: Self = Self { negative: false, magnitude: Wide::ZERO };

    pub fn new(negative: bool, magnitude: U256) -> Self {
        Self {
            negative: negative && !magnitude.is_zero(),
            magnitude: magnitude.into(),
        }
    }

    pub fn from_unsigned(magnitude: U256) -> Self {
        Self::new(false, magnitude)
    }

    pub fn is_negative(&self) -> bool {
        self.negative
    }

    pub fn magnitude(&self) -> U256 {
        self.magnitude.get()
    }

    /// The value as an unsigned word, or `None` when negative.
    pub fn to_unsigned(self) -> Option<U256> {
        (!self.negative).then(|| self.magnitude())
    }

    pub fn negated(self) -> Self {
        Self::new(!self.negative, self.magnitude())
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        let (a, b) = (self.magnitude(), other.magnitude());
        if self.negative == other.negative {
            return a.checked_add(b).map(|m| Self::new(self.negative, m));
        }
        Some(match a.cmp(&b) {
            Ordering::Less => Self::new(other.negative, b - a),
            _ => Self::new(self.negative, a - b),
        })
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.checked_add(other.negated())
    }
}

impl From<i128> for SignedWide {
    fn from(value: i128) -> Self {
        Self::new(value < 0, U256::from(value.unsigned_abs()))
    }
}

impl PartialOrd for SignedWide {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SignedWide {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.negative, other.negative) {
            (false, true) => Ordering::Greater,
            (true, false) => Ordering::Less,
            (false, false) => self.magnitude().cmp(&other.magnitude()),
            (true, true) => other.magnitude().cmp(&self.magnitude()),
        }
    }
}

impl fmt::Display for SignedWide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negative {
            f.write_str("-")?;
        }
        write!(f, "{}", self.magnitude())
    }
}

impl fmt::Debug for SignedWide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl Serialize for SignedWide {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for SignedWide {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s.as_str()),
        };
        U256::from_dec_str(digits)
            .map(|m| Self::new(negative, m))
            .map_err(|e| serde::de::Error::custom(format!("invalid signed 256-bit decimal {s:?}: {e:?}")))
    }
}
