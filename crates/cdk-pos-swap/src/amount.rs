//! Satoshi amounts
//!
//! Amounts are never negative. Arithmetic that would underflow or overflow
//! returns `None` or an [`Error`] instead of wrapping.

use std::fmt;
use std::ops::Add;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Amount Error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Negative amount
    #[error("Amount cannot be negative: `{0}`")]
    Negative(i64),
    /// Amount overflow
    #[error("Amount Overflow")]
    AmountOverflow,
}

/// Non-negative amount in satoshis
#[derive(Debug, Clone, Copy, Default, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Satoshis(u64);

impl Satoshis {
    /// Amount zero
    pub const ZERO: Satoshis = Satoshis(0);

    /// Create new [`Satoshis`]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Value in satoshis
    pub const fn value(&self) -> u64 {
        self.0
    }

    /// Is zero
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checked addition for Amount. Returns None if overflow occurs.
    pub fn checked_add(self, other: Satoshis) -> Option<Satoshis> {
        self.0.checked_add(other.0).map(Satoshis)
    }

    /// Checked subtraction for Amount. Returns None if the result would be negative.
    pub fn checked_sub(self, other: Satoshis) -> Option<Satoshis> {
        self.0.checked_sub(other.0).map(Satoshis)
    }

    /// Subtraction clamped at zero
    pub fn saturating_sub(self, other: Satoshis) -> Satoshis {
        Satoshis(self.0.saturating_sub(other.0))
    }

    /// Try sum to check for overflow
    pub fn try_sum<I>(iter: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = Self>,
    {
        iter.into_iter().try_fold(Satoshis::ZERO, |acc, x| {
            acc.checked_add(x).ok_or(Error::AmountOverflow)
        })
    }
}

impl fmt::Display for Satoshis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Satoshis {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Satoshis> for u64 {
    fn from(value: Satoshis) -> Self {
        value.0
    }
}

impl TryFrom<i64> for Satoshis {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u64::try_from(value)
            .map(Satoshis)
            .map_err(|_| Error::Negative(value))
    }
}

impl Add for Satoshis {
    type Output = Option<Satoshis>;

    fn add(self, rhs: Satoshis) -> Self::Output {
        self.checked_add(rhs)
    }
}
