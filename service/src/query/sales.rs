//! [`Query`] collection related to the multiple [`Sale`]s.

use std::ops::RangeInclusive;

use common::operations::By;

use crate::domain::{sale, Sale};
#[cfg(doc)]
use crate::Query;

use super::DatabaseQuery;

/// Queries [`Sale`]s created within the provided inclusive range, ordered by
/// their creation.
pub type ByDateRange =
    DatabaseQuery<By<Vec<Sale>, RangeInclusive<sale::CreationDateTime>>>;
