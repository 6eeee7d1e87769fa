//! GraphQL [`Mutation`]s definitions.

use common::Money;
use juniper::graphql_object;
use service::{command, Command as _};

use crate::{
    api, define_error,
    error::{Categorize as _, Known},
    AsError, Context, Error,
};

/// Root of all GraphQL mutations.
#[derive(Clone, Copy, Debug)]
pub struct Mutation;

impl Mutation {
    /// Name of the [`tracing::Span`] for the mutations.
    const SPAN_NAME: &'static str = "GraphQL mutation";
}

#[graphql_object(context = Context)]
impl Mutation {
    /// Creates a new `Operator` with the provided name.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "createOperator",
            name = %name,
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn create_operator(
        name: api::operator::Name,
        ctx: &Context,
    ) -> Result<api::Operator, Error> {
        ctx.service()
            .execute(command::CreateOperator { name: name.into() })
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())
            .map(Into::into)
    }

    /// Adds a new `Product` to the catalog.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `ZERO_PRICE` - the provided `price` is zero;
    /// - `PRICE_TOO_LARGE` - the provided `price` has more than 10 integer
    ///                       digits;
    /// - `NEGATIVE_QUANTITY` - the provided `quantity` is negative.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "createProduct",
            name = %name,
            otel.name = Self::SPAN_NAME,
            price = %price,
            quantity = %quantity,
        ),
    )]
    pub async fn create_product(
        name: api::product::Name,
        price: Money,
        quantity: i32,
        ctx: &Context,
    ) -> Result<api::Product, Error> {
        ctx.service()
            .execute(command::CreateProduct {
                name: name.into(),
                price,
                quantity,
            })
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())
            .map(Into::into)
    }

    /// Edits the `Product` with the provided ID.
    ///
    /// Already recorded `Sale`s keep describing the `Product` as it was.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `PRODUCT_NOT_EXISTS` - the `Product` with the provided ID does not
    ///                          exist;
    /// - `ZERO_PRICE` - the provided `price` is zero;
    /// - `PRICE_TOO_LARGE` - the provided `price` has more than 10 integer
    ///                       digits;
    /// - `NEGATIVE_QUANTITY` - the provided `quantity` is negative;
    /// - `CONCURRENT_MODIFICATION` - the `Product` is being modified by
    ///                               other requests, retry later.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "updateProduct",
            id = %id,
            name = ?name.as_ref().map(ToString::to_string),
            otel.name = Self::SPAN_NAME,
            price = ?price.as_ref().map(ToString::to_string),
            quantity = ?quantity,
        ),
    )]
    pub async fn update_product(
        id: api::product::Id,
        name: Option<api::product::Name>,
        price: Option<Money>,
        quantity: Option<i32>,
        ctx: &Context,
    ) -> Result<api::Product, Error> {
        ctx.service()
            .execute(command::UpdateProduct {
                product_id: id.into(),
                name: name.map(Into::into),
                price,
                quantity,
            })
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())
            .map(Into::into)
    }

    /// Opens a new `WorkPeriod` for the `Operator` with the provided ID.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `OPERATOR_NOT_EXISTS` - the `Operator` with the provided ID does not
    ///                           exist;
    /// - `WORK_PERIOD_ALREADY_OPEN` - the `Operator` has an open `WorkPeriod`
    ///                                already;
    /// - `CONCURRENT_MODIFICATION` - the `Operator` is being served by other
    ///                               requests, retry later.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "startWorkPeriod",
            operator_id = %operator_id,
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn start_work_period(
        operator_id: api::operator::Id,
        ctx: &Context,
    ) -> Result<api::WorkPeriod, Error> {
        ctx.service()
            .execute(command::StartWorkPeriod {
                operator_id: operator_id.into(),
            })
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())
            .map(Into::into)
    }

    /// Closes the `WorkPeriod` with the provided ID, freezing its counters.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `WORK_PERIOD_NOT_EXISTS` - the `WorkPeriod` with the provided ID does
    ///                              not exist or belongs to another
    ///                              `Operator`;
    /// - `WORK_PERIOD_ALREADY_CLOSED` - the `WorkPeriod` is closed already;
    /// - `CONCURRENT_MODIFICATION` - the `Operator` is being served by other
    ///                               requests, retry later.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "closeWorkPeriod",
            id = %id,
            operator_id = %operator_id,
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn close_work_period(
        id: api::work_period::Id,
        operator_id: api::operator::Id,
        ctx: &Context,
    ) -> Result<api::WorkPeriod, Error> {
        ctx.service()
            .execute(command::CloseWorkPeriod {
                work_period_id: id.into(),
                operator_id: operator_id.into(),
            })
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())
            .map(Into::into)
    }

    /// Records a new `Sale`, withdrawing the sold units from the stock.
    ///
    /// Either the whole `Sale` is recorded, or nothing changes.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `NO_ITEMS` - no items provided;
    /// - `INVALID_QUANTITY` - a quantity is not positive or too big;
    /// - `SUBTOTAL_MISMATCH` - a subtotal differs from the price of the
    ///                         requested quantity;
    /// - `TOTAL_MISMATCH` - the `total` differs from the sum of subtotals;
    /// - `AMOUNT_TOO_LARGE` - a subtotal or the `total` has more than 12
    ///                        integer digits;
    /// - `OPERATOR_NOT_EXISTS` - the `Operator` with the provided ID does not
    ///                           exist;
    /// - `PRODUCT_NOT_EXISTS` - a `Product` does not exist or is unavailable;
    /// - `NO_OPEN_WORK_PERIOD` - the `Operator` has no open `WorkPeriod`;
    /// - `INSUFFICIENT_STOCK` - a `Product` has not enough units in stock;
    /// - `CONCURRENT_MODIFICATION` - the `Product`s are being sold by other
    ///                               requests, retry later.
    #[tracing::instrument(
        skip_all,
        fields(
            customer = ?customer.as_ref().map(ToString::to_string),
            gql.name = "createSale",
            items = items.len(),
            operator_id = %operator_id,
            otel.name = Self::SPAN_NAME,
            payment_method = ?payment_method,
            total = %total,
        ),
    )]
    pub async fn create_sale(
        operator_id: api::operator::Id,
        items: Vec<api::sale::ItemInput>,
        total: Money,
        payment_method: api::sale::PaymentMethod,
        customer: Option<api::sale::Customer>,
        ctx: &Context,
    ) -> Result<api::Sale, Error> {
        ctx.service()
            .execute(command::CreateSale {
                operator_id: operator_id.into(),
                items: items.into_iter().map(Into::into).collect(),
                total,
                payment_method: payment_method.into(),
                customer: customer.map(Into::into),
            })
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())
            .map(Into::into)
    }

    /// Cancels the whole `Sale` with the provided ID, returning the units of
    /// its items to the stock.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `OPERATOR_NOT_EXISTS` - the `Operator` with the provided ID does not
    ///                           exist;
    /// - `SALE_NOT_EXISTS` - the `Sale` with the provided ID does not exist;
    /// - `SALE_ALREADY_CANCELLED` - the `Sale` is cancelled already;
    /// - `CONCURRENT_MODIFICATION` - the `Sale` is being modified by other
    ///                               requests, retry later.
    #[tracing::instrument(
        skip_all,
        fields(
            actor_id = %actor_id,
            gql.name = "cancelSale",
            id = %id,
            otel.name = Self::SPAN_NAME,
            reason = %reason,
        ),
    )]
    pub async fn cancel_sale(
        id: api::sale::Id,
        actor_id: api::operator::Id,
        reason: api::sale::Reason,
        ctx: &Context,
    ) -> Result<api::Sale, Error> {
        ctx.service()
            .execute(command::CancelSale {
                sale_id: id.into(),
                actor_id: actor_id.into(),
                reason: reason.into(),
            })
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())
            .map(Into::into)
    }

    /// Cancels the `SaleItem`s with the provided IDs, returning their units
    /// to the stock.
    ///
    /// A `Sale` whose items are all cancelled becomes cancelled too.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `NO_ITEMS` - no item IDs provided;
    /// - `OPERATOR_NOT_EXISTS` - the `Operator` with the provided ID does not
    ///                           exist;
    /// - `SALE_ITEM_NOT_EXISTS` - a `SaleItem` does not exist;
    /// - `SALE_ITEM_ALREADY_CANCELLED` - a `SaleItem` is cancelled already;
    /// - `SALE_ALREADY_CANCELLED` - the `Sale` of an item is cancelled
    ///                              already;
    /// - `CONCURRENT_MODIFICATION` - the `Sale`s are being modified by other
    ///                               requests, retry later.
    #[tracing::instrument(
        skip_all,
        fields(
            actor_id = %actor_id,
            gql.name = "cancelSaleItems",
            items = item_ids.len(),
            otel.name = Self::SPAN_NAME,
            reason = %reason,
        ),
    )]
    pub async fn cancel_sale_items(
        item_ids: Vec<api::sale::ItemId>,
        actor_id: api::operator::Id,
        reason: api::sale::Reason,
        ctx: &Context,
    ) -> Result<Vec<api::sale::Item>, Error> {
        ctx.service()
            .execute(command::CancelSaleItems {
                item_ids: item_ids.into_iter().map(Into::into).collect(),
                actor_id: actor_id.into(),
                reason: reason.into(),
            })
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())
            .map(|items| items.into_iter().map(Into::into).collect())
    }
}

define_error! {
    enum ConcurrencyError {
        #[code = "CONCURRENT_MODIFICATION"]
        #[message = "Requested entities are being modified concurrently, \
                     retry later"]
        Exhausted,
    }
}

define_error! {
    enum OperatorError {
        #[code = "OPERATOR_NOT_EXISTS"]
        #[message = "`Operator` with the provided ID does not exist"]
        NotExists,
    }
}

define_error! {
    enum ProductError {
        #[code = "PRODUCT_NOT_EXISTS"]
        #[message = "`Product` with the provided ID does not exist or is \
                     unavailable"]
        NotExists,

        #[code = "ZERO_PRICE"]
        #[message = "Price of a `Product` must be positive"]
        ZeroPrice,

        #[code = "PRICE_TOO_LARGE"]
        #[message = "Price of a `Product` must have at most 10 integer \
                     digits"]
        PriceTooLarge,

        #[code = "NEGATIVE_QUANTITY"]
        #[message = "Quantity of a `Product` must not be negative"]
        NegativeQuantity,
    }
}

define_error! {
    enum SaleError {
        #[code = "NO_ITEMS"]
        #[message = "At least one item must be provided"]
        NoItems,

        #[code = "SALE_NOT_EXISTS"]
        #[message = "`Sale` with the provided ID does not exist"]
        NotExists,

        #[code = "SALE_ALREADY_CANCELLED"]
        #[message = "`Sale` is cancelled already"]
        AlreadyCancelled,
    }
}

impl AsError for command::create_operator::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
        }
    }
}

impl AsError for command::create_product::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        let known: Known = match self {
            Self::Db(e) => return e.try_as_error(),
            Self::NegativeQuantity(_) => ProductError::NegativeQuantity.into(),
            Self::PriceTooLarge(_) => ProductError::PriceTooLarge.into(),
            Self::ZeroPrice => ProductError::ZeroPrice.into(),
        };
        Some(known.of(self.category()))
    }
}

impl AsError for command::update_product::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        let known: Known = match self {
            Self::Db(e) => return e.try_as_error(),
            Self::NegativeQuantity(_) => ProductError::NegativeQuantity.into(),
            Self::ProductNotExists(_) => ProductError::NotExists.into(),
            Self::RetriesExhausted(_) => ConcurrencyError::Exhausted.into(),
            Self::PriceTooLarge(_) => ProductError::PriceTooLarge.into(),
            Self::ZeroPrice => ProductError::ZeroPrice.into(),
        };
        Some(known.of(self.category()))
    }
}

impl AsError for command::start_work_period::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        define_error! {
            enum Error {
                #[code = "WORK_PERIOD_ALREADY_OPEN"]
                #[message = "`Operator` has an open `WorkPeriod` already"]
                AlreadyOpen,
            }
        }

        let known: Known = match self {
            Self::AlreadyOpen(_) | Self::AlreadyOpenConcurrently => {
                Error::AlreadyOpen.into()
            }
            Self::Db(e) => return e.try_as_error(),
            Self::OperatorNotExists(_) => OperatorError::NotExists.into(),
            Self::RetriesExhausted(_) => ConcurrencyError::Exhausted.into(),
        };
        Some(known.of(self.category()))
    }
}

impl AsError for command::close_work_period::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        define_error! {
            enum Error {
                #[code = "WORK_PERIOD_ALREADY_CLOSED"]
                #[message = "`WorkPeriod` is closed already"]
                AlreadyClosed,

                #[code = "WORK_PERIOD_NOT_EXISTS"]
                #[message = "`WorkPeriod` with the provided ID does not exist \
                             or belongs to another `Operator`"]
                NotExists,
            }
        }

        let known: Known = match self {
            Self::AlreadyClosed(_) => Error::AlreadyClosed.into(),
            Self::Db(e) => return e.try_as_error(),
            Self::RetriesExhausted(_) => ConcurrencyError::Exhausted.into(),
            Self::WorkPeriodNotExists(_) => Error::NotExists.into(),
        };
        Some(known.of(self.category()))
    }
}

impl AsError for command::create_sale::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        define_error! {
            enum Error {
                #[code = "AMOUNT_TOO_LARGE"]
                #[message = "Amounts of the `Sale` exceed the supported \
                             precision"]
                AmountTooLarge,

                #[code = "INSUFFICIENT_STOCK"]
                #[message = "`Product` has not enough units in stock"]
                InsufficientStock,

                #[code = "INVALID_QUANTITY"]
                #[message = "Quantity of an item must be positive"]
                InvalidQuantity,

                #[code = "NO_OPEN_WORK_PERIOD"]
                #[message = "`Operator` has no open `WorkPeriod`"]
                NoOpenWorkPeriod,

                #[code = "SUBTOTAL_MISMATCH"]
                #[message = "Subtotal of an item differs from the price of \
                             the requested quantity"]
                SubtotalMismatch,

                #[code = "TOTAL_MISMATCH"]
                #[message = "Total differs from the sum of subtotals"]
                TotalMismatch,
            }
        }

        let known: Known = match self {
            Self::AmountTooLarge => Error::AmountTooLarge.into(),
            Self::Db(e) => return e.try_as_error(),
            Self::InsufficientStock { .. } => Error::InsufficientStock.into(),
            Self::InvalidQuantity(_) => Error::InvalidQuantity.into(),
            Self::NoItems => SaleError::NoItems.into(),
            Self::NoOpenWorkPeriod(_) => Error::NoOpenWorkPeriod.into(),
            Self::OperatorNotExists(_) => OperatorError::NotExists.into(),
            Self::ProductNotExists(_) => ProductError::NotExists.into(),
            Self::RetriesExhausted(_) => ConcurrencyError::Exhausted.into(),
            Self::SubtotalMismatch { .. } => Error::SubtotalMismatch.into(),
            Self::TotalMismatch { .. } => Error::TotalMismatch.into(),
        };
        Some(known.of(self.category()))
    }
}

impl AsError for command::cancel_sale::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        let known: Known = match self {
            Self::Db(e) => return e.try_as_error(),
            Self::OperatorNotExists(_) => OperatorError::NotExists.into(),
            Self::ProductNotExists(_) => ProductError::NotExists.into(),
            Self::RetriesExhausted(_) => ConcurrencyError::Exhausted.into(),
            Self::SaleAlreadyCancelled(_) => SaleError::AlreadyCancelled.into(),
            Self::SaleNotExists(_) => SaleError::NotExists.into(),
        };
        Some(known.of(self.category()))
    }
}

impl AsError for command::cancel_sale_items::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        define_error! {
            enum Error {
                #[code = "SALE_ITEM_ALREADY_CANCELLED"]
                #[message = "`SaleItem` is cancelled already"]
                ItemAlreadyCancelled,

                #[code = "SALE_ITEM_NOT_EXISTS"]
                #[message = "`SaleItem` with the provided ID does not exist"]
                ItemNotExists,
            }
        }

        let known: Known = match self {
            Self::Db(e) => return e.try_as_error(),
            Self::ItemAlreadyCancelled(_) => Error::ItemAlreadyCancelled.into(),
            Self::ItemNotExists(_) => Error::ItemNotExists.into(),
            Self::NoItems => SaleError::NoItems.into(),
            Self::OperatorNotExists(_) => OperatorError::NotExists.into(),
            Self::ProductNotExists(_) => ProductError::NotExists.into(),
            Self::RetriesExhausted(_) => ConcurrencyError::Exhausted.into(),
            Self::SaleAlreadyCancelled(_) => SaleError::AlreadyCancelled.into(),
            Self::SaleNotExists(_) => SaleError::NotExists.into(),
        };
        Some(known.of(self.category()))
    }
}

#[cfg(test)]
mod spec {
    use http::StatusCode;
    use service::{
        command::{cancel_sale, create_sale, start_work_period},
        domain::{operator, sale},
    };

    use crate::AsError as _;

    #[test]
    fn reports_status_of_error_category() {
        use create_sale::ExecutionError as E;

        let err = E::NoOpenWorkPeriod(operator::Id::new()).as_error();
        assert_eq!(err.code, "NO_OPEN_WORK_PERIOD");
        assert_eq!(err.status_code, StatusCode::FORBIDDEN);

        let err = E::AmountTooLarge.as_error();
        assert_eq!(err.code, "AMOUNT_TOO_LARGE");
        assert_eq!(err.status_code, StatusCode::BAD_REQUEST);

        let err = E::RetriesExhausted(5).as_error();
        assert_eq!(err.code, "CONCURRENT_MODIFICATION");
        assert_eq!(err.status_code, StatusCode::CONFLICT);

        let err = cancel_sale::ExecutionError::SaleNotExists(sale::Id::new())
            .as_error();
        assert_eq!(err.code, "SALE_NOT_EXISTS");
        assert_eq!(err.status_code, StatusCode::NOT_FOUND);

        let err = start_work_period::ExecutionError::AlreadyOpenConcurrently
            .as_error();
        assert_eq!(err.code, "WORK_PERIOD_ALREADY_OPEN");
        assert_eq!(err.status_code, StatusCode::CONFLICT);
    }
}
