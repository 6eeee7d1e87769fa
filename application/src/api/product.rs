//! [`Product`]-related definitions.

use common::{DateTime, Money};
use derive_more::{AsRef, Display, From, Into};
use juniper::{graphql_object, GraphQLScalar};
use service::domain;
use uuid::Uuid;

use crate::{api, api::scalar, Context};

/// Catalog product being sold.
#[derive(Clone, Debug, From)]
pub struct Product(domain::Product);

/// Catalog product being sold.
#[graphql_object(context = Context)]
impl Product {
    /// Unique identifier of this `Product`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Product.id",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub fn id(&self) -> Id {
        self.0.id.into()
    }

    /// Name of this `Product`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Product.name",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub fn name(&self) -> Name {
        self.0.name.clone().into()
    }

    /// Price of a single unit of this `Product`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Product.price",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub fn price(&self) -> Money {
        self.0.price
    }

    /// Number of units of this `Product` in stock.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Product.quantity",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub fn quantity(&self) -> i32 {
        self.0.quantity.get()
    }

    /// Indicator whether this `Product` can be sold.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Product.isAvailable",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub fn is_available(&self) -> bool {
        self.0.is_available
    }

    /// `DateTime` when this `Product` was created.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Product.createdAt",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub fn created_at(&self) -> DateTime {
        self.0.created_at.coerce()
    }
}

/// Unique identifier of a `Product`.
#[derive(Clone, Copy, Debug, Display, Into, From, GraphQLScalar)]
#[from(domain::product::Id)]
#[into(domain::product::Id)]
#[graphql(name = "ProductId", transparent)]
pub struct Id(Uuid);

/// Name of a `Product`.
#[derive(AsRef, Clone, Debug, Display, From, GraphQLScalar, Into)]
#[graphql(
    name = "ProductName",
    with = scalar::Via::<domain::product::Name>,
)]
pub struct Name(domain::product::Name);
