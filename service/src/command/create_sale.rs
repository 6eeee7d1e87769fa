//! [`Command`] for creating a new [`Sale`].

use std::collections::BTreeMap;

use common::{
    operations::{
        By, Commit, Insert, Lock, Select, Transact, Transacted, Update,
    },
    DateTime, Money,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{
        operator, product, sale, work_period, Operator, Product, Sale,
        WorkPeriod,
    },
    error::{Categorize, Category},
    infra::{database, Database},
    read::work_period::Open,
    Service,
};

use super::{Command, Retryable};

/// [`Command`] for creating a new [`Sale`].
///
/// Stock of every sold [`Product`] is withdrawn and the open [`WorkPeriod`]
/// of the [`Operator`] is accrued in the same transaction the [`Sale`] is
/// recorded in.
#[derive(Clone, Debug)]
pub struct CreateSale {
    /// ID of the [`Operator`] making the [`Sale`].
    pub operator_id: operator::Id,

    /// Requested [`Item`]s.
    ///
    /// Several [`Item`]s of the same [`Product`] are merged into one.
    pub items: Vec<Item>,

    /// Total the client expects to pay.
    pub total: Money,

    /// [`sale::PaymentMethod`] of a new [`Sale`].
    pub payment_method: sale::PaymentMethod,

    /// Optional [`sale::Customer`] of a new [`Sale`].
    pub customer: Option<sale::Customer>,
}

/// Requested item of a [`CreateSale`] [`Command`].
#[derive(Clone, Copy, Debug)]
pub struct Item {
    /// ID of the [`Product`] to sell.
    pub product_id: product::Id,

    /// Number of [`Product`] units to sell.
    pub quantity: i32,

    /// Subtotal the client expects to pay for the [`Item`].
    pub subtotal: Money,
}

impl<Db> Command<CreateSale> for Service<Db>
where
    Db: Database<Transact, Err = Traced<database::Error>>
        + Database<
            Select<By<Option<Operator>, operator::Id>>,
            Ok = Option<Operator>,
            Err = Traced<database::Error>,
        >,
    Transacted<Db>: Database<
            Lock<By<Operator, operator::Id>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Open<WorkPeriod>>, operator::Id>>,
            Ok = Option<Open<WorkPeriod>>,
            Err = Traced<database::Error>,
        > + Database<
            Lock<By<Product, product::Id>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Product>, product::Id>>,
            Ok = Option<Product>,
            Err = Traced<database::Error>,
        > + Database<
            Update<product::Withdrawal>,
            Ok = Option<Product>,
            Err = Traced<database::Error>,
        > + Database<Insert<Sale>, Err = Traced<database::Error>>
        + Database<
            Update<work_period::Accrual>,
            Ok = Option<WorkPeriod>,
            Err = Traced<database::Error>,
        > + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Sale;
    type Err = Traced<ExecutionError>;

    #[expect(clippy::too_many_lines, reason = "still readable")]
    async fn execute(&self, cmd: CreateSale) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CreateSale {
            operator_id,
            items,
            total,
            payment_method,
            customer,
        } = cmd;

        if items.is_empty() {
            return Err(tracerr::new!(E::NoItems));
        }

        // Ordered by `product::Id` to lock `Product`s in the same order in
        // every transaction.
        let mut lines =
            BTreeMap::<product::Id, (product::Quantity, Money)>::new();
        for Item {
            product_id,
            quantity,
            subtotal,
        } in items
        {
            let quantity = product::Quantity::new(quantity)
                .filter(|q| !q.is_zero())
                .ok_or(E::InvalidQuantity(product_id))
                .map_err(tracerr::wrap!())?;
            let (sum, subtotal_sum) = lines
                .entry(product_id)
                .or_insert((product::Quantity::ZERO, Money::ZERO));
            *sum = sum
                .checked_add(quantity)
                .ok_or(E::InvalidQuantity(product_id))
                .map_err(tracerr::wrap!())?;
            *subtotal_sum = subtotal_sum
                .checked_add(subtotal)
                .ok_or(E::AmountTooLarge)
                .map_err(tracerr::wrap!())?;
        }

        self.database()
            .execute(Select(By::<Option<Operator>, _>::new(operator_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::OperatorNotExists(operator_id))
            .map_err(tracerr::wrap!())?;

        let lines = &lines;
        let customer = &customer;
        self.retry(|| async move {
            let tx = self
                .database()
                .execute(Transact)
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?;

            // Avoid the `WorkPeriod` being closed concurrently.
            tx.execute(Lock(By::<Operator, _>::new(operator_id)))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))
                .map(drop)?;

            let Open(period) = tx
                .execute(Select(By::<Option<Open<WorkPeriod>>, _>::new(
                    operator_id,
                )))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?
                .ok_or(E::NoOpenWorkPeriod(operator_id))
                .map_err(tracerr::wrap!())?;

            let mut products = Vec::with_capacity(lines.len());
            for (&product_id, &(quantity, subtotal)) in lines {
                tx.execute(Lock(By::<Product, _>::new(product_id)))
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))
                    .map(drop)?;

                let product = tx
                    .execute(Select(By::<Option<Product>, _>::new(product_id)))
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))?
                    .filter(|p| p.is_available)
                    .ok_or(E::ProductNotExists(product_id))
                    .map_err(tracerr::wrap!())?;
                if !product.can_supply(quantity) {
                    return Err(tracerr::new!(E::InsufficientStock {
                        product_id,
                        requested: quantity,
                        available: product.quantity,
                    }));
                }

                let expected = product
                    .price
                    .checked_times(quantity)
                    .filter(|m| m.fits(Sale::AMOUNT_DIGITS))
                    .ok_or(E::AmountTooLarge)
                    .map_err(tracerr::wrap!())?;
                if !expected.approx_eq(subtotal) {
                    return Err(tracerr::new!(E::SubtotalMismatch {
                        product_id,
                        expected,
                        actual: subtotal,
                    }));
                }

                products.push((product, quantity, expected));
            }

            let expected = products
                .iter()
                .try_fold(Money::ZERO, |sum, (_, _, s)| sum.checked_add(*s))
                .filter(|m| m.fits(Sale::AMOUNT_DIGITS))
                .ok_or(E::AmountTooLarge)
                .map_err(tracerr::wrap!())?;
            if !expected.approx_eq(total) {
                return Err(tracerr::new!(E::TotalMismatch {
                    expected,
                    actual: total,
                }));
            }

            let sale_id = sale::Id::new();
            let mut items = Vec::with_capacity(products.len());
            for (product, quantity, subtotal) in products {
                let updated = tx
                    .execute(Update(product::Withdrawal {
                        product_id: product.id,
                        quantity,
                    }))
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))?
                    .ok_or(E::InsufficientStock {
                        product_id: product.id,
                        requested: quantity,
                        available: product.quantity,
                    })
                    .map_err(tracerr::wrap!())?;

                items.push(sale::Item {
                    id: sale::item::Id::new(),
                    sale_id,
                    product_id: product.id,
                    subtotal,
                    product_name: product.name,
                    unit_price: product.price,
                    quantity,
                    stock_before: product.quantity,
                    stock_after: updated.quantity,
                    cancellation: None,
                });
            }

            let sale = Sale {
                id: sale_id,
                operator_id,
                work_period_id: period.id,
                total: expected,
                items,
                payment_method,
                customer: customer.clone(),
                created_at: DateTime::now().coerce(),
                cancellation: None,
            };
            tx.execute(Insert(sale.clone()))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))
                .map(drop)?;

            tx.execute(Update(work_period::Accrual {
                work_period_id: period.id,
                amount: sale.total,
            }))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::NoOpenWorkPeriod(operator_id))
            .map_err(tracerr::wrap!())?;

            tx.execute(Commit)
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))
                .map(drop)?;

            log::debug!(
                "`Sale(id: {})` of {} committed by `Operator(id: {})`",
                sale.id,
                sale.total,
                operator_id,
            );

            Ok::<_, Traced<E>>(sale)
        })
        .await
    }
}

/// Error of [`CreateSale`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Sale`] has no items.
    #[display("`Sale` must contain at least one item")]
    NoItems,

    /// Requested quantity of a [`Product`] is not positive or too big.
    #[display("Invalid quantity of `Product(id: {_0})`")]
    InvalidQuantity(#[error(not(source))] product::Id),

    /// [`Operator`] with the provided ID does not exist.
    #[display("`Operator(id: {_0})` does not exist")]
    OperatorNotExists(#[error(not(source))] operator::Id),

    /// [`Operator`] has no open [`WorkPeriod`].
    #[display("`Operator(id: {_0})` has no open `WorkPeriod`")]
    NoOpenWorkPeriod(#[error(not(source))] operator::Id),

    /// [`Product`] with the provided ID does not exist or is unavailable.
    #[display("`Product(id: {_0})` does not exist or is unavailable")]
    ProductNotExists(#[error(not(source))] product::Id),

    /// [`Product`] has not enough stock.
    #[display(
        "Insufficient stock of `Product(id: {product_id})`: \
         {requested} requested, {available} available"
    )]
    InsufficientStock {
        /// ID of the [`Product`].
        product_id: product::Id,

        /// Requested quantity.
        requested: product::Quantity,

        /// Quantity in stock.
        available: product::Quantity,
    },

    /// Amounts of the [`Sale`] don't fit into [`Sale::AMOUNT_DIGITS`].
    #[display("`Sale` amounts are too large")]
    AmountTooLarge,

    /// Provided subtotal differs from the price of the requested quantity.
    #[display(
        "Subtotal mismatch for `Product(id: {product_id})`: \
         expected {expected}, got {actual}"
    )]
    SubtotalMismatch {
        /// ID of the [`Product`].
        product_id: product::Id,

        /// Price of the requested quantity.
        expected: Money,

        /// Provided subtotal.
        actual: Money,
    },

    /// Provided total differs from the sum of subtotals.
    #[display("Total mismatch: expected {expected}, got {actual}")]
    TotalMismatch {
        /// Sum of subtotals.
        expected: Money,

        /// Provided total.
        actual: Money,
    },

    /// Concurrent [`Command`]s prevented the [`Sale`] from being recorded.
    #[display("`Sale` wasn't recorded after {_0} attempts")]
    RetriesExhausted(#[error(not(source))] u32),
}

impl Categorize for ExecutionError {
    fn category(&self) -> Category {
        match self {
            Self::Db(_) => Category::Internal,
            Self::NoItems
            | Self::InvalidQuantity(_)
            | Self::AmountTooLarge
            | Self::SubtotalMismatch { .. }
            | Self::TotalMismatch { .. } => Category::Validation,
            Self::OperatorNotExists(_) | Self::ProductNotExists(_) => {
                Category::NotFound
            }
            Self::InsufficientStock { .. } | Self::RetriesExhausted(_) => {
                Category::Conflict
            }
            Self::NoOpenWorkPeriod(_) => Category::Authorization,
        }
    }
}

impl Retryable for ExecutionError {
    fn is_transient(&self) -> bool {
        matches!(self, Self::Db(e) if e.is_transient())
    }

    fn retries_exhausted(attempts: u32) -> Self {
        Self::RetriesExhausted(attempts)
    }
}

#[cfg(test)]
mod spec {
    use std::collections::HashSet;

    use common::{
        operations::{By, Lock, Rollback, Select, Transact},
        DateTime,
    };

    use crate::{
        command::{
            fixture::{self, line, money, sale},
            Command as _, CreateSale, UpdateProduct,
        },
        domain::{operator, product, Operator, Product, WorkPeriod},
        error::{Categorize as _, Category},
        infra::Database as _,
    };

    use super::ExecutionError as E;

    #[tokio::test]
    async fn records_sale_and_withdraws_stock() {
        let svc = fixture::service();
        let (operator, period) = fixture::on_shift(&svc).await;
        let coffee = fixture::product(&svc, "10.00", 5).await;

        let sale = svc
            .execute(sale(&operator, vec![line(&coffee, 3, "30.00")], "30.00"))
            .await
            .unwrap();

        assert_eq!(sale.total, money("30.00"));
        assert_eq!(sale.work_period_id, period.id);
        assert!(!sale.is_cancelled());
        assert_eq!(sale.items.len(), 1);
        let item = &sale.items[0];
        assert_eq!(item.unit_price, money("10.00"));
        assert_eq!(item.subtotal, money("30.00"));
        assert_eq!(item.stock_before.get(), 5);
        assert_eq!(item.stock_after.get(), 2);

        let coffee = fixture::reload(&svc, coffee.id).await;
        assert_eq!(coffee.quantity.get(), 2);
        assert!(coffee.is_available);

        let period = svc
            .database()
            .execute(Select(By::<Option<WorkPeriod>, _>::new(period.id)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(period.sales_count, 1);
        assert_eq!(period.sales_total, money("30.00"));
    }

    #[tokio::test]
    async fn sells_out_last_units() {
        let svc = fixture::service();
        let (operator, _) = fixture::on_shift(&svc).await;
        let coffee = fixture::product(&svc, "2.50", 2).await;

        _ = svc
            .execute(sale(&operator, vec![line(&coffee, 2, "5.00")], "5.00"))
            .await
            .unwrap();

        let coffee = fixture::reload(&svc, coffee.id).await;
        assert!(coffee.quantity.is_zero());
        assert!(!coffee.is_available);
    }

    #[tokio::test]
    async fn merges_lines_of_same_product() {
        let svc = fixture::service();
        let (operator, _) = fixture::on_shift(&svc).await;
        let coffee = fixture::product(&svc, "10.00", 5).await;
        let tea = fixture::product(&svc, "4.00", 5).await;

        let sale = svc
            .execute(sale(
                &operator,
                vec![
                    line(&coffee, 1, "10.00"),
                    line(&tea, 1, "4.00"),
                    line(&coffee, 2, "20.00"),
                ],
                "34.00",
            ))
            .await
            .unwrap();

        assert_eq!(sale.items.len(), 2);
        let merged = sale
            .items
            .iter()
            .find(|i| i.product_id == coffee.id)
            .unwrap();
        assert_eq!(merged.quantity.get(), 3);
        assert_eq!(merged.subtotal, money("30.00"));
        assert_eq!(fixture::reload(&svc, coffee.id).await.quantity.get(), 2);
        assert_eq!(fixture::reload(&svc, tea.id).await.quantity.get(), 4);
    }

    #[tokio::test]
    async fn tolerates_cent_rounding() {
        let svc = fixture::service();
        let (operator, _) = fixture::on_shift(&svc).await;
        let coffee = fixture::product(&svc, "3.33", 5).await;

        let sale = svc
            .execute(sale(&operator, vec![line(&coffee, 3, "10.00")], "10.00"))
            .await
            .unwrap();

        assert_eq!(sale.total, money("9.99"));
        assert!(sale.is_balanced());
    }

    #[tokio::test]
    async fn rejects_empty_sale() {
        let svc = fixture::service();
        let (operator, _) = fixture::on_shift(&svc).await;

        let err = svc
            .execute(sale(&operator, vec![], "0.00"))
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), E::NoItems), "{err}");
        assert_eq!(err.category(), Category::Validation);
    }

    #[tokio::test]
    async fn rejects_non_positive_quantity() {
        let svc = fixture::service();
        let (operator, _) = fixture::on_shift(&svc).await;
        let coffee = fixture::product(&svc, "10.00", 5).await;

        for quantity in [0, -1] {
            let err = svc
                .execute(sale(
                    &operator,
                    vec![line(&coffee, quantity, "0.00")],
                    "0.00",
                ))
                .await
                .unwrap_err();

            assert!(matches!(err.as_ref(), E::InvalidQuantity(_)), "{err}");
            assert_eq!(err.category(), Category::Validation);
        }
        assert_eq!(fixture::reload(&svc, coffee.id).await.quantity.get(), 5);
    }

    #[tokio::test]
    async fn rejects_total_mismatch_without_stock_change() {
        let svc = fixture::service();
        let (operator, _) = fixture::on_shift(&svc).await;
        let coffee = fixture::product(&svc, "10.00", 10).await;

        let err = svc
            .execute(sale(&operator, vec![line(&coffee, 8, "80.00")], "100.00"))
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), E::TotalMismatch { .. }), "{err}");
        assert_eq!(err.category(), Category::Validation);
        assert_eq!(fixture::reload(&svc, coffee.id).await.quantity.get(), 10);
    }

    #[tokio::test]
    async fn rejects_overflowing_amounts() {
        const HUGE: &str = "79228162514264337593543950335";

        let svc = fixture::service();
        let (operator, _) = fixture::on_shift(&svc).await;
        let coffee = fixture::product(&svc, "10.00", 10).await;

        let err = svc
            .execute(sale(
                &operator,
                vec![line(&coffee, 1, HUGE), line(&coffee, 1, HUGE)],
                "20.00",
            ))
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), E::AmountTooLarge), "{err}");
        assert_eq!(err.category(), Category::Validation);
        assert_eq!(fixture::reload(&svc, coffee.id).await.quantity.get(), 10);
    }

    #[tokio::test]
    async fn rejects_subtotal_beyond_stored_precision() {
        let svc = fixture::service();
        let (operator, period) = fixture::on_shift(&svc).await;
        let gold = fixture::product(&svc, "9999999999.99", 1000).await;

        let err = svc
            .execute(sale(
                &operator,
                vec![line(&gold, 1000, "9999999999990.00")],
                "9999999999990.00",
            ))
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), E::AmountTooLarge), "{err}");
        assert_eq!(err.category(), Category::Validation);
        assert_eq!(fixture::reload(&svc, gold.id).await.quantity.get(), 1000);
        let period = svc
            .database()
            .execute(Select(By::<Option<WorkPeriod>, _>::new(period.id)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(period.sales_count, 0);
    }

    #[tokio::test]
    async fn gives_up_on_row_locked_by_another_transaction() {
        let svc = fixture::impatient_service();
        let (operator, period) = fixture::on_shift(&svc).await;
        let coffee = fixture::product(&svc, "10.00", 5).await;

        let other = svc.database().execute(Transact).await.unwrap();
        other
            .execute(Lock(By::<Product, _>::new(coffee.id)))
            .await
            .unwrap();

        let err = svc
            .execute(sale(&operator, vec![line(&coffee, 1, "10.00")], "10.00"))
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), E::RetriesExhausted(2)), "{err}");
        assert_eq!(err.category(), Category::Conflict);

        other.execute(Rollback).await.unwrap();
        assert_eq!(fixture::reload(&svc, coffee.id).await.quantity.get(), 5);
        let period = svc
            .database()
            .execute(Select(By::<Option<WorkPeriod>, _>::new(period.id)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(period.sales_count, 0);
    }

    #[tokio::test]
    async fn rejects_subtotal_mismatch() {
        let svc = fixture::service();
        let (operator, _) = fixture::on_shift(&svc).await;
        let coffee = fixture::product(&svc, "10.00", 10).await;

        let err = svc
            .execute(sale(&operator, vec![line(&coffee, 2, "20.02")], "20.02"))
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), E::SubtotalMismatch { .. }), "{err}");
        assert_eq!(err.category(), Category::Validation);
        assert_eq!(fixture::reload(&svc, coffee.id).await.quantity.get(), 10);
    }

    #[tokio::test]
    async fn rejects_insufficient_stock_without_partial_effect() {
        let svc = fixture::service();
        let (operator, _) = fixture::on_shift(&svc).await;
        let coffee = fixture::product(&svc, "10.00", 5).await;
        let tea = fixture::product(&svc, "4.00", 1).await;

        let err = svc
            .execute(sale(
                &operator,
                vec![line(&coffee, 2, "20.00"), line(&tea, 2, "8.00")],
                "28.00",
            ))
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), E::InsufficientStock { .. }), "{err}");
        assert_eq!(err.category(), Category::Conflict);
        assert_eq!(fixture::reload(&svc, coffee.id).await.quantity.get(), 5);
        assert_eq!(fixture::reload(&svc, tea.id).await.quantity.get(), 1);
    }

    #[tokio::test]
    async fn rejects_unavailable_product() {
        let svc = fixture::service();
        let (operator, _) = fixture::on_shift(&svc).await;
        let coffee = fixture::product(&svc, "10.00", 0).await;

        let err = svc
            .execute(sale(&operator, vec![line(&coffee, 1, "10.00")], "10.00"))
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), E::ProductNotExists(_)), "{err}");
        assert_eq!(err.category(), Category::NotFound);
    }

    #[tokio::test]
    async fn requires_open_work_period() {
        let svc = fixture::service();
        let operator = fixture::operator(&svc).await;
        let coffee = fixture::product(&svc, "10.00", 5).await;

        let err = svc
            .execute(sale(&operator, vec![line(&coffee, 1, "10.00")], "10.00"))
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), E::NoOpenWorkPeriod(_)), "{err}");
        assert_eq!(err.category(), Category::Authorization);
        assert_eq!(fixture::reload(&svc, coffee.id).await.quantity.get(), 5);
    }

    #[tokio::test]
    async fn rejects_unknown_operator() {
        let svc = fixture::service();
        let coffee = fixture::product(&svc, "10.00", 5).await;
        let stranger = Operator {
            id: operator::Id::new(),
            name: operator::Name::new("Bob").unwrap(),
            created_at: DateTime::now().coerce(),
        };

        let err = svc
            .execute(sale(&stranger, vec![line(&coffee, 1, "10.00")], "10.00"))
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), E::OperatorNotExists(_)), "{err}");
        assert_eq!(err.category(), Category::NotFound);
    }

    #[tokio::test]
    async fn keeps_snapshot_after_catalog_edit() {
        let svc = fixture::service();
        let (operator, _) = fixture::on_shift(&svc).await;
        let coffee = fixture::product(&svc, "10.00", 5).await;

        let sale = svc
            .execute(sale(&operator, vec![line(&coffee, 1, "10.00")], "10.00"))
            .await
            .unwrap();
        _ = svc
            .execute(UpdateProduct {
                product_id: coffee.id,
                name: Some(product::Name::new("Espresso").unwrap()),
                price: Some(money("12.00")),
                quantity: None,
            })
            .await
            .unwrap();

        let sale = fixture::reload_sale(&svc, sale.id).await;
        let item = &sale.items[0];
        assert_eq!(item.product_name.to_string(), "Coffee");
        assert_eq!(item.unit_price, money("10.00"));
        assert_eq!(sale.total, money("10.00"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn never_oversells_under_concurrency() {
        const STOCK: i32 = 10;
        const PER_SALE: i32 = 3;
        const SALES: usize = 8;

        let svc = fixture::service();
        let coffee = fixture::product(&svc, "1.00", STOCK).await;

        let mut requests = Vec::with_capacity(SALES);
        for _ in 0..SALES {
            let (operator, _) = fixture::on_shift(&svc).await;
            requests.push(sale(
                &operator,
                vec![line(&coffee, PER_SALE, "3.00")],
                "3.00",
            ));
        }

        let handles = requests
            .into_iter()
            .map(|req: CreateSale| {
                let svc = svc.clone();
                tokio::spawn(async move { svc.execute(req).await })
            })
            .collect::<Vec<_>>();

        let mut sold = HashSet::new();
        let mut rejected = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(sale) => {
                    assert!(sold.insert(sale.id));
                }
                Err(e) => {
                    assert!(
                        matches!(e.as_ref(), E::InsufficientStock { .. }),
                        "{e}",
                    );
                    assert_eq!(e.category(), Category::Conflict);
                    rejected += 1;
                }
            }
        }

        let succeeded = usize::try_from(STOCK / PER_SALE).unwrap();
        assert_eq!(sold.len(), succeeded);
        assert_eq!(rejected, SALES - succeeded);
        let coffee = fixture::reload(&svc, coffee.id).await;
        assert_eq!(coffee.quantity.get(), STOCK % PER_SALE);
    }
}
