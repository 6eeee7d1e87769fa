//! [`Operator`]-related definitions.

use common::DateTime;
use derive_more::{AsRef, Display, From, Into};
use juniper::{graphql_object, GraphQLScalar};
use service::{domain, query, Query as _};
use uuid::Uuid;

use crate::{api, api::scalar, AsError, Context, Error};

/// Person operating a point of sale.
#[derive(Clone, Debug, From)]
pub struct Operator(domain::Operator);

/// Person operating a point of sale.
#[graphql_object(context = Context)]
impl Operator {
    /// Unique identifier of this `Operator`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Operator.id",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub fn id(&self) -> Id {
        self.0.id.into()
    }

    /// Name of this `Operator`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Operator.name",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub fn name(&self) -> Name {
        self.0.name.clone().into()
    }

    /// `DateTime` when this `Operator` was created.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Operator.createdAt",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub fn created_at(&self) -> DateTime {
        self.0.created_at.coerce()
    }

    /// Currently open `WorkPeriod` of this `Operator`, if any.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Operator.openWorkPeriod",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn open_work_period(
        &self,
        ctx: &Context,
    ) -> Result<Option<api::WorkPeriod>, Error> {
        ctx.service()
            .execute(query::work_period::OpenOf::by(self.0.id))
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())
            .map(|p| p.map(|open| open.0.into()))
    }
}

/// Unique identifier of an `Operator`.
#[derive(Clone, Copy, Debug, Display, Into, From, GraphQLScalar)]
#[from(domain::operator::Id)]
#[into(domain::operator::Id)]
#[graphql(name = "OperatorId", transparent)]
pub struct Id(Uuid);

/// Name of an `Operator`.
#[derive(AsRef, Clone, Debug, Display, From, GraphQLScalar, Into)]
#[graphql(
    name = "OperatorName",
    with = scalar::Via::<domain::operator::Name>,
)]
pub struct Name(domain::operator::Name);
