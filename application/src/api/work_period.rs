//! [`WorkPeriod`]-related definitions.

use common::{DateTime, DateTimeOf, Money};
use derive_more::{Display, From, Into};
use juniper::{graphql_object, GraphQLEnum, GraphQLScalar};
use service::{domain, query, Query as _};
use uuid::Uuid;

use crate::{
    api, AsError, Context, Error,
    error::{Category, Known},
};

/// Shift of an `Operator` accumulating the `Sale`s made during it.
#[derive(Clone, Debug, From)]
pub struct WorkPeriod(domain::WorkPeriod);

/// Shift of an `Operator` accumulating the `Sale`s made during it.
#[graphql_object(context = Context)]
impl WorkPeriod {
    /// Unique identifier of this `WorkPeriod`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "WorkPeriod.id",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub fn id(&self) -> Id {
        self.0.id.into()
    }

    /// `Operator` working this `WorkPeriod`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "WorkPeriod.operator",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn operator(
        &self,
        ctx: &Context,
    ) -> Result<api::Operator, Error> {
        ctx.service()
            .execute(query::operator::ById::by(self.0.operator_id))
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())?
            .ok_or_else(|| {
                Known::from(api::query::OperatorError::NotExists).of(Category::NotFound)
            })
            .map_err(ctx.error())
            .map(Into::into)
    }

    /// `Status` of this `WorkPeriod`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "WorkPeriod.status",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub fn status(&self) -> Status {
        self.0.status().into()
    }

    /// `DateTime` when this `WorkPeriod` was opened.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "WorkPeriod.openedAt",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub fn opened_at(&self) -> DateTime {
        self.0.opened_at.coerce()
    }

    /// `DateTime` when this `WorkPeriod` was closed, if it was.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "WorkPeriod.closedAt",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub fn closed_at(&self) -> Option<DateTime> {
        self.0.closed_at.map(DateTimeOf::coerce)
    }

    /// Number of `Sale`s made during this `WorkPeriod`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "WorkPeriod.salesCount",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub fn sales_count(&self) -> Result<i32, Error> {
        self.0.sales_count.try_into().map_err(AsError::into_error)
    }

    /// Total value of `Sale`s made during this `WorkPeriod`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "WorkPeriod.salesTotal",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub fn sales_total(&self) -> Money {
        self.0.sales_total
    }
}

/// Unique identifier of a `WorkPeriod`.
#[derive(Clone, Copy, Debug, Display, Into, From, GraphQLScalar)]
#[from(domain::work_period::Id)]
#[into(domain::work_period::Id)]
#[graphql(name = "WorkPeriodId", transparent)]
pub struct Id(Uuid);

/// Status of a `WorkPeriod`.
#[derive(Clone, Copy, Debug, GraphQLEnum)]
#[graphql(name = "WorkPeriodStatus")]
pub enum Status {
    /// `Sale`s can be made.
    Open,

    /// Counters are frozen.
    Closed,
}

impl From<domain::work_period::Status> for Status {
    fn from(status: domain::work_period::Status) -> Self {
        use domain::work_period::Status as S;
        match status {
            S::Open => Self::Open,
            S::Closed => Self::Closed,
        }
    }
}
