//! [`Sale`] definitions.

pub mod item;

#[cfg(doc)]
use common::DateTime;
use common::{define_kind, unit, DateTimeOf, Money};
use derive_more::{AsRef, Display, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{operator, work_period};
#[cfg(doc)]
use crate::domain::{Operator, WorkPeriod};

pub use self::item::Item;

/// Sale made by an [`Operator`] during a [`WorkPeriod`].
#[derive(Clone, Debug)]
pub struct Sale {
    /// ID of this [`Sale`].
    pub id: Id,

    /// ID of the [`Operator`] who made this [`Sale`].
    pub operator_id: operator::Id,

    /// ID of the [`WorkPeriod`] this [`Sale`] was made during.
    ///
    /// Never changes once the [`Sale`] is created.
    pub work_period_id: work_period::Id,

    /// Line [`Item`]s of this [`Sale`], one per sold product.
    pub items: Vec<Item>,

    /// Total of this [`Sale`], equal to the sum of its [`Item`]s' subtotals.
    pub total: Money,

    /// [`PaymentMethod`] this [`Sale`] was paid with.
    pub payment_method: PaymentMethod,

    /// [`Customer`] this [`Sale`] was made to, if known.
    pub customer: Option<Customer>,

    /// [`DateTime`] when this [`Sale`] was created.
    pub created_at: CreationDateTime,

    /// [`Cancellation`] of this [`Sale`], if it was cancelled.
    pub cancellation: Option<Cancellation>,
}

impl Sale {
    /// Maximum number of integer digits in a [`Sale`] total or an [`Item`]
    /// subtotal.
    pub const AMOUNT_DIGITS: u32 = 12;

    /// Returns [`Status`] of this [`Sale`].
    #[must_use]
    pub fn status(&self) -> Status {
        if self.cancellation.is_some() {
            Status::Cancelled
        } else {
            Status::Active
        }
    }

    /// Indicates whether this [`Sale`] is cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.status() == Status::Cancelled
    }

    /// Indicates whether every [`Item`] of this [`Sale`] is cancelled.
    #[must_use]
    pub fn are_all_items_cancelled(&self) -> bool {
        self.items.iter().all(Item::is_cancelled)
    }

    /// Returns the [`Item`] of this [`Sale`] with the provided ID, if any.
    #[must_use]
    pub fn item_mut(&mut self, id: item::Id) -> Option<&mut Item> {
        self.items.iter_mut().find(|i| i.id == id)
    }

    /// Indicates whether the [`Sale::total`] matches the sum of the
    /// [`Item`]s' subtotals.
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.items
            .iter()
            .map(|i| i.subtotal)
            .sum::<Money>()
            .approx_eq(self.total)
    }
}

/// ID of a [`Sale`].
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

define_kind! {
    #[doc = "Status of a `Sale`."]
    enum Status {
        #[doc = "Stock is withdrawn for the `Sale`."]
        Active = 1,

        #[doc = "Stock is returned, the `Sale` is void."]
        Cancelled = 2,
    }
}

define_kind! {
    #[doc = "Way a `Sale` was paid."]
    enum PaymentMethod {
        #[doc = "Paid in cash."]
        Cash = 1,

        #[doc = "Paid with a debit card."]
        DebitCard = 2,

        #[doc = "Paid with a credit card."]
        CreditCard = 3,

        #[doc = "Paid with an instant bank transfer."]
        Transfer = 4,
    }
}

/// Free-form label of a customer a [`Sale`] was made to.
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Customer(String);

impl Customer {
    /// Creates a new [`Customer`] if the given `label` is valid.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Option<Self> {
        let label = label.into();
        Self::check(&label).then_some(Self(label))
    }

    /// Checks whether the given `label` is a valid [`Customer`].
    fn check(label: impl AsRef<str>) -> bool {
        let label = label.as_ref();
        label.trim() == label && !label.is_empty() && label.len() <= 256
    }
}

impl FromStr for Customer {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Customer`")
    }
}

/// Record of cancelling a [`Sale`] or one of its [`Item`]s.
#[derive(Clone, Debug)]
pub struct Cancellation {
    /// ID of the [`Operator`] who cancelled.
    pub by: operator::Id,

    /// [`DateTime`] of the cancellation.
    pub at: CancellationDateTime,

    /// [`Reason`] of the cancellation.
    pub reason: Reason,
}

/// Reason of a [`Cancellation`].
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Reason(String);

impl Reason {
    /// Creates a new [`Reason`] if the given `reason` is valid.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Option<Self> {
        let reason = reason.into();
        Self::check(&reason).then_some(Self(reason))
    }

    /// Checks whether the given `reason` is a valid [`Reason`].
    fn check(reason: impl AsRef<str>) -> bool {
        let reason = reason.as_ref();
        !reason.trim().is_empty() && reason.len() <= 1024
    }
}

impl FromStr for Reason {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Reason`")
    }
}

/// [`DateTime`] when a [`Sale`] was created.
pub type CreationDateTime = DateTimeOf<(Sale, unit::Creation)>;

/// [`DateTime`] when a [`Sale`] or its [`Item`] was cancelled.
pub type CancellationDateTime = DateTimeOf<(Sale, unit::Cancellation)>;

#[cfg(test)]
mod spec {
    use std::str::FromStr as _;

    use super::{PaymentMethod, Status};

    #[test]
    fn payment_method_is_named_in_screaming_snake_case() {
        assert_eq!(PaymentMethod::DebitCard.to_string(), "DEBIT_CARD");
        assert_eq!(
            PaymentMethod::from_str("CREDIT_CARD"),
            Ok(PaymentMethod::CreditCard),
        );
        assert!(PaymentMethod::from_str("CHEQUE").is_err());
    }

    #[test]
    fn kinds_are_restored_from_stored_value() {
        assert_eq!(PaymentMethod::from_u8(4), Some(PaymentMethod::Transfer));
        assert_eq!(
            Status::from_u8(Status::Cancelled.u8()),
            Some(Status::Cancelled),
        );
        assert_eq!(Status::from_u8(0), None);
    }
}
