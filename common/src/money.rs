//! [`Money`]-related definitions.

use std::{fmt, iter::Sum, ops, str::FromStr};

#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use rust_decimal::{Decimal, RoundingStrategy};

/// Non-negative amount of money rounded to two fraction digits.
///
/// Amounts coming from different sources (computed vs. client-supplied) are
/// compared with [`Money::approx_eq()`] rather than `==`.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Money(Decimal);

impl Money {
    /// Zero amount of [`Money`].
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Maximum difference at which two [`Money`] amounts are still considered
    /// equal.
    pub const TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

    /// Number of fraction digits every [`Money`] amount is rounded to.
    const SCALE: u32 = 2;

    /// Creates a new [`Money`] out of the provided `amount`, rounding it to
    /// two fraction digits.
    ///
    /// [`None`] is returned if the `amount` is negative.
    #[must_use]
    pub fn new(amount: Decimal) -> Option<Self> {
        (!amount.is_sign_negative() || amount.is_zero())
            .then(|| Self(Self::round(amount.abs())))
    }

    /// Returns the underlying amount of this [`Money`].
    #[must_use]
    pub const fn amount(self) -> Decimal {
        self.0
    }

    /// Indicates whether this [`Money`] is exactly zero.
    #[must_use]
    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    /// Multiplies this [`Money`] by the provided non-negative `factor`,
    /// rounding the result to two fraction digits.
    #[must_use]
    pub fn times(self, factor: impl Into<Decimal>) -> Self {
        Self(Self::round(self.0 * factor.into().abs()))
    }

    /// Multiplies this [`Money`] by the provided non-negative `factor`,
    /// rounding the result to two fraction digits.
    ///
    /// [`None`] is returned on overflow.
    #[must_use]
    pub fn checked_times(self, factor: impl Into<Decimal>) -> Option<Self> {
        self.0
            .checked_mul(factor.into().abs())
            .map(|amount| Self(Self::round(amount)))
    }

    /// Adds the `other` [`Money`] to this one.
    ///
    /// [`None`] is returned on overflow.
    #[must_use]
    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    /// Indicates whether the integer part of this [`Money`] has no more than
    /// the provided number of `digits`.
    #[must_use]
    pub fn fits(self, digits: u32) -> bool {
        10_u64
            .checked_pow(digits)
            .map_or(true, |bound| self.0 < Decimal::from(bound))
    }

    /// Indicates whether this [`Money`] differs from the `other` one by no
    /// more than [`Money::TOLERANCE`].
    #[must_use]
    pub fn approx_eq(self, other: Self) -> bool {
        (self.0 - other.0).abs() <= Self::TOLERANCE
    }

    /// Rounds the provided `amount` to two fraction digits.
    fn round(amount: Decimal) -> Decimal {
        let mut rounded = amount.round_dp_with_strategy(
            Self::SCALE,
            RoundingStrategy::MidpointAwayFromZero,
        );
        rounded.rescale(Self::SCALE);
        rounded
    }
}

impl ops::Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, ops::Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl FromStr for Money {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let amount = Decimal::from_str(s.trim()).map_err(|_| "invalid amount")?;
        Self::new(amount).ok_or("negative amount")
    }
}

#[cfg(feature = "serde")]
mod serde {
    //! Module providing integration with [`serde`] crate.

    use std::str::FromStr as _;

    use serde::{
        de::Error as _, Deserialize, Deserializer, Serialize, Serializer,
    };

    use super::Money;

    impl Serialize for Money {
        fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
            s.collect_str(self)
        }
    }

    impl<'de> Deserialize<'de> for Money {
        fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
            let s = String::deserialize(d)?;
            Self::from_str(&s).map_err(D::Error::custom)
        }
    }
}

#[cfg(feature = "juniper")]
mod juniper {
    //! Module providing integration with [`juniper`] crate.

    use std::str::FromStr as _;

    use juniper::{graphql_scalar, InputValue, ScalarValue, Value};

    /// Non-negative amount of money in `{major}.{minor}` format, where:
    /// - `major` is an integer;
    /// - `minor` is an optional integer rounded to two digits.
    #[graphql_scalar(with = Self, parse_token(String))]
    type Money = super::Money;

    impl Money {
        fn to_output<S: ScalarValue>(m: &Money) -> Value<S> {
            Value::scalar(m.to_string())
        }

        fn from_input<S: ScalarValue>(
            input: &InputValue<S>,
        ) -> Result<Self, String> {
            input
                .as_string_value()
                .ok_or_else(|| {
                    format!(
                        "Cannot parse `Money` input scalar from \
                         non-string value: {input}",
                    )
                })
                .and_then(|s| {
                    Self::from_str(s).map_err(|e| {
                        format!("Cannot parse `Money` input scalar: {e}")
                    })
                })
        }
    }
}

#[cfg(test)]
mod spec {
    use std::str::FromStr as _;

    use rust_decimal::Decimal;

    use super::Money;

    fn money(s: &str) -> Money {
        Money::from_str(s).unwrap()
    }

    #[test]
    fn from_str() {
        assert_eq!(
            Money::from_str("123.45").unwrap().amount(),
            Decimal::from_str("123.45").unwrap(),
        );
        assert_eq!(money("123.456"), money("123.46"));
        assert_eq!(money("123.454"), money("123.45"));
        assert_eq!(money("0.005"), money("0.01"));
        assert_eq!(money(" 7 "), money("7.00"));

        assert!(Money::from_str("-1.00").is_err());
        assert!(Money::from_str("12USD").is_err());
        assert!(Money::from_str("").is_err());

        assert!(Money::from_str("0").is_ok());
        assert!(Money::from_str("-0").is_ok());
    }

    #[test]
    fn to_string() {
        assert_eq!(money("123.45").to_string(), "123.45");
        assert_eq!(money("123").to_string(), "123.00");
        assert_eq!(money("123.4").to_string(), "123.40");
        assert_eq!(Money::ZERO.to_string(), "0.00");
    }

    #[test]
    fn times_rounds_to_cents() {
        assert_eq!(money("10.00").times(3), money("30.00"));
        assert_eq!(money("0.333").times(3), money("0.99"));
        assert_eq!(money("1.115").times(1), money("1.12"));
        assert_eq!(money("2.50").times(0), Money::ZERO);
    }

    #[test]
    fn checked_arithmetic_detects_overflow() {
        let max = money("79228162514264337593543950335");

        assert_eq!(max.checked_add(money("1")), None);
        assert_eq!(max.checked_times(2), None);
        assert_eq!(
            money("1.10").checked_add(money("2.25")),
            Some(money("3.35")),
        );
        assert_eq!(money("0.333").checked_times(3), Some(money("0.99")));
    }

    #[test]
    fn fits_integer_digits() {
        assert!(money("9999999999.99").fits(10));
        assert!(!money("10000000000").fits(10));
        assert!(money("0").fits(0) && !money("1").fits(0));
        assert!(money("79228162514264337593543950335").fits(20));
    }

    #[test]
    fn approx_eq_respects_tolerance() {
        assert!(money("30.00").approx_eq(money("30.00")));
        assert!(money("30.00").approx_eq(money("30.01")));
        assert!(money("30.01").approx_eq(money("30.00")));
        assert!(!money("30.00").approx_eq(money("30.02")));
        assert!(!money("100.00").approx_eq(money("80.00")));
    }

    #[test]
    fn sums() {
        let total: Money =
            [money("10.10"), money("0.90"), money("4")].into_iter().sum();
        assert_eq!(total, money("15.00"));

        let mut acc = Money::ZERO;
        acc += money("1.01");
        assert_eq!(acc + money("0.99"), money("2"));
    }
}
