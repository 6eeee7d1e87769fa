//! Fixtures for command tests.

use std::time::Duration;

use common::{
    operations::{By, Select},
    Money,
};

use crate::{
    command::{self, create_sale, Command as _},
    domain::{operator, product, sale, Operator, Product, Sale, WorkPeriod},
    infra::{Database as _, Memory},
    Config, RetryConfig, Service,
};

/// Creates a new [`Service`] over an empty [`Memory`] database.
pub(crate) fn service() -> Service<Memory> {
    Service::new(Config::default(), Memory::default())
}

/// Creates a new [`Service`] over an empty [`Memory`] database, waiting for
/// row locks briefly and making two attempts at most.
pub(crate) fn impatient_service() -> Service<Memory> {
    Service::new(
        Config {
            retry: RetryConfig {
                attempts: 2,
                backoff: Duration::from_millis(1),
            },
        },
        Memory::new(Duration::from_millis(20)),
    )
}

/// Parses the provided [`Money`] amount.
pub(crate) fn money(amount: &str) -> Money {
    amount.parse().unwrap()
}

/// Creates a new [`Operator`].
pub(crate) async fn operator(svc: &Service<Memory>) -> Operator {
    svc.execute(command::CreateOperator {
        name: operator::Name::new("Alice").unwrap(),
    })
    .await
    .unwrap()
}

/// Creates a new [`Operator`] with an open [`WorkPeriod`].
pub(crate) async fn on_shift(svc: &Service<Memory>) -> (Operator, WorkPeriod) {
    let operator = operator(svc).await;
    let period = svc
        .execute(command::StartWorkPeriod {
            operator_id: operator.id,
        })
        .await
        .unwrap();
    (operator, period)
}

/// Creates a new [`Product`] with the provided price and stock.
pub(crate) async fn product(
    svc: &Service<Memory>,
    price: &str,
    quantity: i32,
) -> Product {
    svc.execute(command::CreateProduct {
        name: product::Name::new("Coffee").unwrap(),
        price: money(price),
        quantity,
    })
    .await
    .unwrap()
}

/// Reads the current state of the [`Product`].
pub(crate) async fn reload(svc: &Service<Memory>, id: product::Id) -> Product {
    svc.database()
        .execute(Select(By::<Option<Product>, _>::new(id)))
        .await
        .unwrap()
        .unwrap()
}

/// Reads the current state of the [`Sale`].
pub(crate) async fn reload_sale(svc: &Service<Memory>, id: sale::Id) -> Sale {
    svc.database()
        .execute(Select(By::<Option<Sale>, _>::new(id)))
        .await
        .unwrap()
        .unwrap()
}

/// Builds a requested [`create_sale::Item`].
pub(crate) fn line(
    product: &Product,
    quantity: i32,
    subtotal: &str,
) -> create_sale::Item {
    create_sale::Item {
        product_id: product.id,
        quantity,
        subtotal: money(subtotal),
    }
}

/// Builds a [`command::CreateSale`] paid in cash.
pub(crate) fn sale(
    operator: &Operator,
    items: Vec<create_sale::Item>,
    total: &str,
) -> command::CreateSale {
    command::CreateSale {
        operator_id: operator.id,
        items,
        total: money(total),
        payment_method: sale::PaymentMethod::Cash,
        customer: None,
    }
}
