//! GraphQL [`Query`]s definitions.

use common::DateTime;
use juniper::graphql_object;
use service::{query, Query as _};

use crate::{
    api, define_error,
    error::{Category, Known},
    AsError, Context, Error,
};

/// Root of all GraphQL queries.
#[derive(Clone, Copy, Debug)]
pub struct Query;

impl Query {
    /// Name of the [`tracing::Span`] for the queries.
    pub(crate) const SPAN_NAME: &'static str = "GraphQL query";
}

#[graphql_object(context = Context)]
impl Query {
    /// Returns the `Operator` with the specified ID.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `OPERATOR_NOT_EXISTS` - the `Operator` with the specified ID does not
    ///                           exist.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "operator",
            id = %id,
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn operator(
        id: api::operator::Id,
        ctx: &Context,
    ) -> Result<api::Operator, Error> {
        ctx.service()
            .execute(query::operator::ById::by(id.into()))
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())?
            .ok_or_else(|| {
                Known::from(OperatorError::NotExists).of(Category::NotFound)
            })
            .map_err(ctx.error())
            .map(Into::into)
    }

    /// Returns the `Product` with the specified ID.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `PRODUCT_NOT_EXISTS` - the `Product` with the specified ID does not
    ///                          exist.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "product",
            id = %id,
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn product(
        id: api::product::Id,
        ctx: &Context,
    ) -> Result<api::Product, Error> {
        ctx.service()
            .execute(query::product::ById::by(id.into()))
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())?
            .ok_or_else(|| {
                Known::from(ProductError::NotExists).of(Category::NotFound)
            })
            .map_err(ctx.error())
            .map(Into::into)
    }

    /// Returns the `Sale` with the specified ID.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `SALE_NOT_EXISTS` - the `Sale` with the specified ID does not exist.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "sale",
            id = %id,
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn sale(
        id: api::sale::Id,
        ctx: &Context,
    ) -> Result<api::Sale, Error> {
        ctx.service()
            .execute(query::sale::ById::by(id.into()))
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())?
            .ok_or_else(|| {
                Known::from(SaleError::NotExists).of(Category::NotFound)
            })
            .map_err(ctx.error())
            .map(Into::into)
    }

    /// Returns the `Sale`s created between the specified `DateTime`s
    /// (inclusive), ordered by their creation.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `INVERTED_DATE_RANGE` - `from` is later than `to`.
    #[tracing::instrument(
        skip_all,
        fields(
            from = %from.to_rfc3339(),
            gql.name = "sales",
            otel.name = Self::SPAN_NAME,
            to = %to.to_rfc3339(),
        ),
    )]
    pub async fn sales(
        from: DateTime,
        to: DateTime,
        ctx: &Context,
    ) -> Result<Vec<api::Sale>, Error> {
        if from > to {
            let err = Known::from(DateRangeError::Inverted);
            return Err(ctx.error()(err.of(Category::Validation)));
        }

        ctx.service()
            .execute(query::sales::ByDateRange::by(
                from.coerce()..=to.coerce(),
            ))
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())
            .map(|sales| sales.into_iter().map(Into::into).collect())
    }

    /// Returns the `WorkPeriod` with the specified ID.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `WORK_PERIOD_NOT_EXISTS` - the `WorkPeriod` with the specified ID
    ///                              does not exist.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "workPeriod",
            id = %id,
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn work_period(
        id: api::work_period::Id,
        ctx: &Context,
    ) -> Result<api::WorkPeriod, Error> {
        ctx.service()
            .execute(query::work_period::ById::by(id.into()))
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())?
            .ok_or_else(|| {
                Known::from(WorkPeriodError::NotExists).of(Category::NotFound)
            })
            .map_err(ctx.error())
            .map(Into::into)
    }

    /// Returns the currently open `WorkPeriod` of the `Operator` with the
    /// specified ID, if any.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "openWorkPeriod",
            operator_id = %operator_id,
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn open_work_period(
        operator_id: api::operator::Id,
        ctx: &Context,
    ) -> Result<Option<api::WorkPeriod>, Error> {
        ctx.service()
            .execute(query::work_period::OpenOf::by(operator_id.into()))
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())
            .map(|p| p.map(|open| open.0.into()))
    }
}

define_error! {
    enum DateRangeError {
        #[code = "INVERTED_DATE_RANGE"]
        #[message = "Start of the date range is later than its end"]
        Inverted,
    }
}

define_error! {
    enum OperatorError {
        #[code = "OPERATOR_NOT_EXISTS"]
        #[message = "`Operator` with the specified ID does not exist"]
        NotExists,
    }
}

define_error! {
    enum ProductError {
        #[code = "PRODUCT_NOT_EXISTS"]
        #[message = "`Product` with the specified ID does not exist"]
        NotExists,
    }
}

define_error! {
    enum SaleError {
        #[code = "SALE_NOT_EXISTS"]
        #[message = "`Sale` with the specified ID does not exist"]
        NotExists,
    }
}

define_error! {
    enum WorkPeriodError {
        #[code = "WORK_PERIOD_NOT_EXISTS"]
        #[message = "`WorkPeriod` with the specified ID does not exist"]
        NotExists,
    }
}
