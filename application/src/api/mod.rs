//! GraphQL API definitions.

mod mutation;
pub mod operator;
pub mod product;
mod query;
pub mod sale;
pub mod scalar;
pub mod work_period;

use juniper::EmptySubscription;

use crate::Context;

pub use self::{
    mutation::Mutation, operator::Operator, product::Product, query::Query,
    sale::Sale, work_period::WorkPeriod,
};

/// GraphQL schema.
pub type Schema =
    juniper::RootNode<'static, Query, Mutation, EmptySubscription<Context>>;
