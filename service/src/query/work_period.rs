//! [`Query`] collection related to a single [`WorkPeriod`].

use common::operations::By;

use crate::{
    domain::{operator, work_period, WorkPeriod},
    read::work_period::Open,
};
#[cfg(doc)]
use crate::{domain::Operator, Query};

use super::DatabaseQuery;

/// Queries a [`WorkPeriod`] by its [`work_period::Id`].
pub type ById = DatabaseQuery<By<Option<WorkPeriod>, work_period::Id>>;

/// Queries the currently [`Open`] [`WorkPeriod`] of an [`Operator`].
pub type OpenOf = DatabaseQuery<By<Option<Open<WorkPeriod>>, operator::Id>>;
