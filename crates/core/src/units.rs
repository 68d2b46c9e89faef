//! Weight and money units with fixed-precision rounding.
//!
//! Scale readings stay in whole kilograms (`i64`). Tonnage and money are
//! `rust_decimal` values rounded **once**, at the point of derivation, never
//! re-derived from already-rounded intermediates.

use core::ops::{Add, Neg, Sub};

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

const TONNES_DP: u32 = 3;
const MONEY_DP: u32 = 2;

/// A raw scale reading, in whole kilograms.
///
/// Signed: the difference of two readings (net weight) may legitimately be
/// negative and is surfaced downstream as a data-quality signal, not rejected.
#[derive(
    Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Kilograms(i64);

impl Kilograms {
    pub const fn new(kg: i64) -> Self {
        Self(kg)
    }

    pub const fn value(self) -> i64 {
        self.0
    }

    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Convert to tonnes. Whole kilograms divide exactly into 3 decimal
    /// places, so this never rounds.
    pub fn to_tonnes(self) -> Tonnes {
        Tonnes(Decimal::new(self.0, TONNES_DP))
    }
}

impl Sub for Kilograms {
    type Output = Kilograms;

    fn sub(self, rhs: Self) -> Self::Output {
        Kilograms(self.0 - rhs.0)
    }
}

impl Add for Kilograms {
    type Output = Kilograms;

    fn add(self, rhs: Self) -> Self::Output {
        Kilograms(self.0 + rhs.0)
    }
}

impl core::fmt::Display for Kilograms {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} kg", self.0)
    }
}

/// A signed quantity of material in tonnes, held at 3 decimal places.
#[derive(
    Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Tonnes(Decimal);

impl Tonnes {
    pub const ZERO: Tonnes = Tonnes(Decimal::ZERO);

    /// Round an arbitrary decimal to ledger precision (3 dp, half away from
    /// zero). The single rounding point for tonnage entering the system.
    pub fn new(value: Decimal) -> Self {
        Self(value.round_dp_with_strategy(TONNES_DP, RoundingStrategy::MidpointAwayFromZero))
    }

    /// Whole-tonne convenience constructor (tests, thresholds).
    pub fn from_whole(tonnes: i64) -> Self {
        Self(Decimal::new(tonnes, 0))
    }

    pub fn value(self) -> Decimal {
        self.0
    }

    pub fn abs(self) -> Tonnes {
        Tonnes(self.0.abs())
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    pub fn is_positive(self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }
}

impl Add for Tonnes {
    type Output = Tonnes;

    fn add(self, rhs: Self) -> Self::Output {
        Tonnes(self.0 + rhs.0)
    }
}

impl Sub for Tonnes {
    type Output = Tonnes;

    fn sub(self, rhs: Self) -> Self::Output {
        Tonnes(self.0 - rhs.0)
    }
}

impl Neg for Tonnes {
    type Output = Tonnes;

    fn neg(self) -> Self::Output {
        Tonnes(-self.0)
    }
}

impl core::fmt::Display for Tonnes {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} t", self.0)
    }
}

/// A monetary amount held at 2 decimal places.
#[derive(
    Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    /// Round an arbitrary decimal to monetary precision (2 dp, half away
    /// from zero).
    pub fn new(value: Decimal) -> Self {
        Self(value.round_dp_with_strategy(MONEY_DP, RoundingStrategy::MidpointAwayFromZero))
    }

    /// Whole-unit convenience constructor (tests, price lists).
    pub fn from_whole(amount: i64) -> Self {
        Self(Decimal::new(amount, 0))
    }

    pub fn value(self) -> Decimal {
        self.0
    }

    /// Settlement value of a tonnage at a per-tonne price. The product is
    /// computed exactly, then rounded once.
    pub fn settle(price_per_tonne: Money, quantity: Tonnes) -> Money {
        Money::new(price_per_tonne.0 * quantity.value())
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money(self.0 + rhs.0)
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}
