//! [`Sale`]-related definitions.

use common::{DateTime, Money};
use derive_more::{AsRef, Display, From, Into};
use juniper::{graphql_object, GraphQLEnum, GraphQLInputObject, GraphQLScalar};
use service::{domain, query, Query as _};
use uuid::Uuid;

use crate::{
    api, api::scalar, AsError, Context, Error,
    error::{Category, Known},
};

/// Sale made by an `Operator` during a `WorkPeriod`.
#[derive(Clone, Debug, From)]
pub struct Sale(domain::Sale);

/// Sale made by an `Operator` during a `WorkPeriod`.
#[graphql_object(context = Context)]
impl Sale {
    /// Unique identifier of this `Sale`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Sale.id",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub fn id(&self) -> Id {
        self.0.id.into()
    }

    /// `Operator` who made this `Sale`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Sale.operator",
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

    /// `WorkPeriod` this `Sale` was made during.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Sale.workPeriod",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn work_period(
        &self,
        ctx: &Context,
    ) -> Result<api::WorkPeriod, Error> {
        ctx.service()
            .execute(query::work_period::ById::by(self.0.work_period_id))
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())?
            .ok_or_else(|| {
                Known::from(api::query::WorkPeriodError::NotExists).of(Category::NotFound)
            })
            .map_err(ctx.error())
            .map(Into::into)
    }

    /// Line items of this `Sale`, one per sold `Product`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Sale.items",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub fn items(&self) -> Vec<Item> {
        self.0.items.iter().cloned().map(Into::into).collect()
    }

    /// Total of this `Sale`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Sale.total",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub fn total(&self) -> Money {
        self.0.total
    }

    /// `PaymentMethod` this `Sale` was paid with.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Sale.paymentMethod",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub fn payment_method(&self) -> PaymentMethod {
        self.0.payment_method.into()
    }

    /// Customer this `Sale` was made to, if known.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Sale.customer",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub fn customer(&self) -> Option<Customer> {
        self.0.customer.clone().map(Into::into)
    }

    /// `Status` of this `Sale`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Sale.status",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub fn status(&self) -> Status {
        self.0.status().into()
    }

    /// `DateTime` when this `Sale` was created.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Sale.createdAt",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub fn created_at(&self) -> DateTime {
        self.0.created_at.coerce()
    }

    /// `Cancellation` of this `Sale`, if it was cancelled.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Sale.cancellation",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub fn cancellation(&self) -> Option<Cancellation> {
        self.0.cancellation.clone().map(Into::into)
    }
}

/// Line of a `Sale` selling a single `Product`.
#[derive(Clone, Debug, From)]
pub struct Item(domain::sale::Item);

/// Line of a `Sale` selling a single `Product`.
///
/// Describes the `Product` as it was at the moment of the `Sale`.
#[graphql_object(name = "SaleItem", context = Context)]
impl Item {
    /// Unique identifier of this `SaleItem`.
    #[must_use]
    pub fn id(&self) -> ItemId {
        self.0.id.into()
    }

    /// Unique identifier of the sold `Product`.
    #[must_use]
    pub fn product_id(&self) -> api::product::Id {
        self.0.product_id.into()
    }

    /// Name of the sold `Product`.
    #[must_use]
    pub fn product_name(&self) -> api::product::Name {
        self.0.product_name.clone().into()
    }

    /// Price of a single unit of the sold `Product`.
    #[must_use]
    pub fn unit_price(&self) -> Money {
        self.0.unit_price
    }

    /// Number of sold units.
    #[must_use]
    pub fn quantity(&self) -> i32 {
        self.0.quantity.get()
    }

    /// Price of all the sold units.
    #[must_use]
    pub fn subtotal(&self) -> Money {
        self.0.subtotal
    }

    /// Stock of the `Product` right before the `Sale`.
    #[must_use]
    pub fn stock_before(&self) -> i32 {
        self.0.stock_before.get()
    }

    /// Stock of the `Product` right after the `Sale`.
    #[must_use]
    pub fn stock_after(&self) -> i32 {
        self.0.stock_after.get()
    }

    /// `Cancellation` of this `SaleItem`, if it was cancelled.
    #[must_use]
    pub fn cancellation(&self) -> Option<Cancellation> {
        self.0.cancellation.clone().map(Into::into)
    }
}

/// Record of cancelling a `Sale` or one of its items.
#[derive(Clone, Debug, From)]
pub struct Cancellation(domain::sale::Cancellation);

/// Record of cancelling a `Sale` or one of its items.
#[graphql_object(name = "SaleCancellation", context = Context)]
impl Cancellation {
    /// `Operator` who cancelled.
    pub async fn by(&self, ctx: &Context) -> Result<api::Operator, Error> {
        ctx.service()
            .execute(query::operator::ById::by(self.0.by))
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())?
            .ok_or_else(|| {
                Known::from(api::query::OperatorError::NotExists).of(Category::NotFound)
            })
            .map_err(ctx.error())
            .map(Into::into)
    }

    /// `DateTime` of the cancellation.
    #[must_use]
    pub fn at(&self) -> DateTime {
        self.0.at.coerce()
    }

    /// Reason of the cancellation.
    #[must_use]
    pub fn reason(&self) -> Reason {
        self.0.reason.clone().into()
    }
}

/// Requested line of a new `Sale`.
#[derive(Clone, Debug, GraphQLInputObject)]
#[graphql(name = "SaleItemInput")]
pub struct ItemInput {
    /// Unique identifier of the `Product` to sell.
    pub product_id: api::product::Id,

    /// Number of units to sell.
    pub quantity: i32,

    /// Subtotal the client expects to pay for the line.
    pub subtotal: Money,
}

impl From<ItemInput> for service::command::create_sale::Item {
    fn from(input: ItemInput) -> Self {
        let ItemInput {
            product_id,
            quantity,
            subtotal,
        } = input;
        Self {
            product_id: product_id.into(),
            quantity,
            subtotal,
        }
    }
}

/// Unique identifier of a `Sale`.
#[derive(Clone, Copy, Debug, Display, Into, From, GraphQLScalar)]
#[from(domain::sale::Id)]
#[into(domain::sale::Id)]
#[graphql(name = "SaleId", transparent)]
pub struct Id(Uuid);

/// Unique identifier of a `SaleItem`.
#[derive(Clone, Copy, Debug, Display, Into, From, GraphQLScalar)]
#[from(domain::sale::item::Id)]
#[into(domain::sale::item::Id)]
#[graphql(name = "SaleItemId", transparent)]
pub struct ItemId(Uuid);

/// Free-form label of a customer a `Sale` was made to.
#[derive(AsRef, Clone, Debug, Display, From, GraphQLScalar, Into)]
#[graphql(
    name = "SaleCustomer",
    with = scalar::Via::<domain::sale::Customer>,
)]
pub struct Customer(domain::sale::Customer);

/// Reason of cancelling a `Sale` or one of its items.
#[derive(AsRef, Clone, Debug, Display, From, GraphQLScalar, Into)]
#[graphql(
    name = "SaleCancellationReason",
    with = scalar::Via::<domain::sale::Reason>,
)]
pub struct Reason(domain::sale::Reason);

/// Way a `Sale` was paid.
#[derive(Clone, Copy, Debug, GraphQLEnum)]
pub enum PaymentMethod {
    /// Paid in cash.
    Cash,

    /// Paid with a debit card.
    DebitCard,

    /// Paid with a credit card.
    CreditCard,

    /// Paid with an instant bank transfer.
    Transfer,
}

impl From<domain::sale::PaymentMethod> for PaymentMethod {
    fn from(method: domain::sale::PaymentMethod) -> Self {
        use domain::sale::PaymentMethod as M;
        match method {
            M::Cash => Self::Cash,
            M::DebitCard => Self::DebitCard,
            M::CreditCard => Self::CreditCard,
            M::Transfer => Self::Transfer,
        }
    }
}

impl From<PaymentMethod> for domain::sale::PaymentMethod {
    fn from(method: PaymentMethod) -> Self {
        match method {
            PaymentMethod::Cash => Self::Cash,
            PaymentMethod::DebitCard => Self::DebitCard,
            PaymentMethod::CreditCard => Self::CreditCard,
            PaymentMethod::Transfer => Self::Transfer,
        }
    }
}

/// Status of a `Sale`.
#[derive(Clone, Copy, Debug, GraphQLEnum)]
#[graphql(name = "SaleStatus")]
pub enum Status {
    /// Stock is withdrawn for the `Sale`.
    Active,

    /// Stock is returned, the `Sale` is void.
    Cancelled,
}

impl From<domain::sale::Status> for Status {
    fn from(status: domain::sale::Status) -> Self {
        use domain::sale::Status as S;
        match status {
            S::Active => Self::Active,
            S::Cancelled => Self::Cancelled,
        }
    }
}
