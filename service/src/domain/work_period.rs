//! [`WorkPeriod`] definitions.

#[cfg(doc)]
use common::DateTime;
use common::{define_kind, unit, DateTimeOf, Money};
use derive_more::{Display, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::operator;
#[cfg(doc)]
use crate::domain::{Operator, Sale};

/// Shift of an [`Operator`] accumulating the [`Sale`]s made during it.
#[derive(Clone, Debug)]
pub struct WorkPeriod {
    /// ID of this [`WorkPeriod`].
    pub id: Id,

    /// ID of the [`Operator`] working this [`WorkPeriod`].
    pub operator_id: operator::Id,

    /// [`DateTime`] when this [`WorkPeriod`] was opened.
    pub opened_at: OpeningDateTime,

    /// [`DateTime`] when this [`WorkPeriod`] was closed, if it was.
    pub closed_at: Option<ClosingDateTime>,

    /// Number of [`Sale`]s made during this [`WorkPeriod`].
    pub sales_count: u32,

    /// Total value of [`Sale`]s made during this [`WorkPeriod`].
    pub sales_total: Money,
}

impl WorkPeriod {
    /// Opens a new [`WorkPeriod`] for the provided [`Operator`] with zeroed
    /// counters.
    #[must_use]
    pub fn open(operator_id: operator::Id) -> Self {
        Self {
            id: Id::new(),
            operator_id,
            opened_at: OpeningDateTime::now(),
            closed_at: None,
            sales_count: 0,
            sales_total: Money::ZERO,
        }
    }

    /// Returns [`Status`] of this [`WorkPeriod`].
    #[must_use]
    pub fn status(&self) -> Status {
        if self.closed_at.is_some() {
            Status::Closed
        } else {
            Status::Open
        }
    }

    /// Indicates whether this [`WorkPeriod`] is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status() == Status::Open
    }
}

/// ID of a [`WorkPeriod`].
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
    #[doc = "Status of a `WorkPeriod`."]
    enum Status {
        #[doc = "Sales can be made."]
        Open = 1,

        #[doc = "Counters are frozen."]
        Closed = 2,
    }
}

/// Accrual of a committed [`Sale`] into the counters of an open
/// [`WorkPeriod`].
#[derive(Clone, Copy, Debug)]
pub struct Accrual {
    /// ID of the [`WorkPeriod`] the [`Sale`] was stamped with.
    pub work_period_id: Id,

    /// Total of the [`Sale`].
    pub amount: Money,
}

/// [`DateTime`] when a [`WorkPeriod`] was opened.
pub type OpeningDateTime = DateTimeOf<(WorkPeriod, unit::Opening)>;

/// [`DateTime`] when a [`WorkPeriod`] was closed.
pub type ClosingDateTime = DateTimeOf<(WorkPeriod, unit::Closing)>;
