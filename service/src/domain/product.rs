//! [`Product`] definitions.

use std::fmt;

#[cfg(doc)]
use common::DateTime;
use common::{unit, DateTimeOf, Money};
use derive_more::{AsRef, Display, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Catalog product being sold.
#[derive(Clone, Debug)]
pub struct Product {
    /// ID of this [`Product`].
    pub id: Id,

    /// [`Name`] of this [`Product`].
    pub name: Name,

    /// Price of a single unit of this [`Product`].
    pub price: Money,

    /// [`Quantity`] of this [`Product`] in stock.
    pub quantity: Quantity,

    /// Indicator whether this [`Product`] can be sold.
    ///
    /// Turns `false` once the stock runs out and back to `true` once it is
    /// replenished.
    pub is_available: bool,

    /// [`DateTime`] when this [`Product`] was created.
    pub created_at: CreationDateTime,
}

impl Product {
    /// Maximum number of integer digits in a [`Product`] price.
    pub const PRICE_DIGITS: u32 = 10;

    /// Indicates whether the provided [`Quantity`] can be withdrawn from the
    /// stock of this [`Product`].
    #[must_use]
    pub fn can_supply(&self, quantity: Quantity) -> bool {
        self.is_available && self.quantity >= quantity
    }

    /// Sets the stock of this [`Product`] to the provided [`Quantity`],
    /// deriving its availability.
    pub fn set_quantity(&mut self, quantity: Quantity) {
        self.quantity = quantity;
        self.is_available = !quantity.is_zero();
    }
}

/// ID of a [`Product`].
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Display,
    Eq,
    From,
    FromStr,
    Hash,
    Into,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[cfg_attr(feature = "postgres", derive(ToSql, FromSql), postgres(transparent))]
pub struct Id(Uuid);

impl Id {
    /// Creates a new random [`Id`].
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Name of a [`Product`].
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Name(String);

impl Name {
    /// Creates a new [`Name`] if the given `name` is valid.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Option<Self> {
        let name = name.into();
        Self::check(&name).then_some(Self(name))
    }

    /// Checks whether the given `name` is a valid [`Name`].
    fn check(name: impl AsRef<str>) -> bool {
        let name = name.as_ref();
        name.trim() == name && !name.is_empty() && name.len() <= 512
    }
}

impl FromStr for Name {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Name`")
    }
}

/// Non-negative number of [`Product`] units.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Eq,
    Hash,
    Into,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[cfg_attr(feature = "postgres", derive(ToSql, FromSql), postgres(transparent))]
#[serde(try_from = "i32")]
pub struct Quantity(i32);

impl Quantity {
    /// Zero [`Quantity`].
    pub const ZERO: Self = Self(0);

    /// Creates a new [`Quantity`].
    ///
    /// [`None`] is returned if the provided `value` is negative.
    #[must_use]
    pub fn new(value: i32) -> Option<Self> {
        (value >= 0).then_some(Self(value))
    }

    /// Returns the underlying number of units.
    #[must_use]
    pub const fn get(self) -> i32 {
        self.0
    }

    /// Indicates whether this [`Quantity`] is zero.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Adds the `other` [`Quantity`] to this one.
    ///
    /// [`None`] is returned on overflow.
    #[must_use]
    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    /// Subtracts the `other` [`Quantity`] from this one.
    ///
    /// [`None`] is returned if the result would be negative.
    #[must_use]
    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).and_then(Self::new)
    }
}

impl TryFrom<i32> for Quantity {
    type Error = &'static str;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::new(value).ok_or("negative `Quantity`")
    }
}

impl From<Quantity> for Decimal {
    fn from(q: Quantity) -> Self {
        Self::from(q.0)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Conditional withdrawal of [`Product`] units from its stock.
///
/// Applies only if the stock holds at least the requested [`Quantity`], so the
/// stock never goes negative.
#[derive(Clone, Copy, Debug)]
pub struct Withdrawal {
    /// ID of the [`Product`] to withdraw units of.
    pub product_id: Id,

    /// [`Quantity`] to withdraw.
    pub quantity: Quantity,
}

/// Return of [`Product`] units into its stock.
#[derive(Clone, Copy, Debug)]
pub struct Restock {
    /// ID of the [`Product`] to return units of.
    pub product_id: Id,

    /// [`Quantity`] to return.
    pub quantity: Quantity,
}

/// [`DateTime`] when a [`Product`] was created.
pub type CreationDateTime = DateTimeOf<(Product, unit::Creation)>;

#[cfg(test)]
mod spec {
    use common::{DateTime, Money};

    use super::{Id, Name, Product, Quantity};

    fn product(quantity: i32) -> Product {
        Product {
            id: Id::new(),
            name: Name::new("Coffee").unwrap(),
            price: "2.50".parse::<Money>().unwrap(),
            quantity: Quantity::new(quantity).unwrap(),
            is_available: quantity > 0,
            created_at: DateTime::now().coerce(),
        }
    }

    #[test]
    fn quantity_is_never_negative() {
        assert!(Quantity::new(-1).is_none());
        assert_eq!(Quantity::new(0), Some(Quantity::ZERO));

        let five = Quantity::new(5).unwrap();
        let three = Quantity::new(3).unwrap();
        assert_eq!(five.checked_sub(three), Quantity::new(2));
        assert_eq!(three.checked_sub(five), None);
        assert_eq!(
            Quantity::new(i32::MAX).unwrap().checked_add(three),
            None,
        );
    }

    #[test]
    fn availability_follows_stock() {
        let mut p = product(1);
        assert!(p.can_supply(Quantity::new(1).unwrap()));
        assert!(!p.can_supply(Quantity::new(2).unwrap()));

        p.set_quantity(Quantity::ZERO);
        assert!(!p.is_available);
        assert!(!p.can_supply(Quantity::ZERO));

        p.set_quantity(Quantity::new(4).unwrap());
        assert!(p.is_available);
    }

    #[test]
    fn name_is_trimmed_and_non_empty() {
        assert!(Name::new("").is_none());
        assert!(Name::new(" Tea").is_none());
        assert!(Name::new("Tea").is_some());
    }
}
