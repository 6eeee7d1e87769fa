//! [`Item`] definitions.

use common::Money;
use derive_more::{Display, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{product, sale};
#[cfg(doc)]
use crate::domain::{Product, Sale};

/// Line of a [`Sale`] selling a single [`Product`].
///
/// Everything describing the [`Product`] is a snapshot taken when the
/// [`Sale`] was made, and is not affected by later catalog changes.
#[derive(Clone, Debug)]
pub struct Item {
    /// ID of this [`Item`].
    pub id: Id,

    /// ID of the [`Sale`] this [`Item`] belongs to.
    pub sale_id: sale::Id,

    /// ID of the sold [`Product`].
    pub product_id: product::Id,

    /// Name of the sold [`Product`].
    pub product_name: product::Name,

    /// Price of a single unit of the sold [`Product`].
    pub unit_price: Money,

    /// Number of sold units.
    pub quantity: product::Quantity,

    /// Price of all the sold units.
    pub subtotal: Money,

    /// Stock of the [`Product`] right before the [`Sale`].
    pub stock_before: product::Quantity,

    /// Stock of the [`Product`] right after the [`Sale`].
    pub stock_after: product::Quantity,

    /// [`sale::Cancellation`] of this [`Item`], if it was cancelled.
    pub cancellation: Option<sale::Cancellation>,
}

impl Item {
    /// Indicates whether this [`Item`] is cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_some()
    }
}

/// ID of an [`Item`].
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
