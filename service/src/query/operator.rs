//! [`Query`] collection related to a single [`Operator`].

use common::operations::By;

use crate::domain::{operator, Operator};
#[cfg(doc)]
use crate::Query;

use super::DatabaseQuery;

/// Queries an [`Operator`] by its [`operator::Id`].
pub type ById = DatabaseQuery<By<Option<Operator>, operator::Id>>;
