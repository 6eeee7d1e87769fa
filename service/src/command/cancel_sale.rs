//! [`Command`] for cancelling a whole [`Sale`].

use common::{
    operations::{By, Commit, Lock, Select, Transact, Transacted, Update},
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{operator, product, sale, Operator, Product, Sale},
    error::{Categorize, Category},
    infra::{database, Database},
    Service,
};

use super::{Command, Retryable};

/// [`Command`] for cancelling a whole [`Sale`].
///
/// Stock of every [`Product`] withdrawn by the [`Sale`] items, which weren't
/// cancelled before, is restored.
#[derive(Clone, Debug)]
pub struct CancelSale {
    /// ID of the [`Sale`] to cancel.
    pub sale_id: sale::Id,

    /// ID of the [`Operator`] cancelling the [`Sale`].
    pub actor_id: operator::Id,

    /// [`sale::Reason`] of the cancellation.
    pub reason: sale::Reason,
}

impl<Db> Command<CancelSale> for Service<Db>
where
    Db: Database<Transact, Err = Traced<database::Error>>
        + Database<
            Select<By<Option<Operator>, operator::Id>>,
            Ok = Option<Operator>,
            Err = Traced<database::Error>,
        >,
    Transacted<Db>: Database<
            Lock<By<Sale, sale::Id>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Sale>, sale::Id>>,
            Ok = Option<Sale>,
            Err = Traced<database::Error>,
        > + Database<
            Update<product::Restock>,
            Ok = Option<Product>,
            Err = Traced<database::Error>,
        > + Database<Update<Sale>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Sale;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: CancelSale) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CancelSale {
            sale_id,
            actor_id,
            reason,
        } = cmd;

        self.database()
            .execute(Select(By::<Option<Operator>, _>::new(actor_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::OperatorNotExists(actor_id))
            .map_err(tracerr::wrap!())?;

        let reason = &reason;
        self.retry(|| async move {
            let tx = self
                .database()
                .execute(Transact)
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?;

            tx.execute(Lock(By::<Sale, _>::new(sale_id)))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))
                .map(drop)?;

            let mut sale = tx
                .execute(Select(By::<Option<Sale>, _>::new(sale_id)))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?
                .ok_or(E::SaleNotExists(sale_id))
                .map_err(tracerr::wrap!())?;
            if sale.is_cancelled() {
                return Err(tracerr::new!(E::SaleAlreadyCancelled(sale_id)));
            }

            // Items cancelled one by one have already returned their stock.
            let mut restocks = sale
                .items
                .iter()
                .filter(|i| !i.is_cancelled())
                .map(|i| product::Restock {
                    product_id: i.product_id,
                    quantity: i.quantity,
                })
                .collect::<Vec<_>>();
            restocks.sort_by_key(|r| r.product_id);
            for restock in restocks {
                tx.execute(Update(restock))
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))?
                    .ok_or(E::ProductNotExists(restock.product_id))
                    .map_err(tracerr::wrap!())?;
            }

            let cancellation = sale::Cancellation {
                by: actor_id,
                at: DateTime::now().coerce(),
                reason: reason.clone(),
            };
            for item in sale.items.iter_mut().filter(|i| !i.is_cancelled()) {
                item.cancellation = Some(cancellation.clone());
            }
            sale.cancellation = Some(cancellation);

            tx.execute(Update(sale.clone()))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))
                .map(drop)?;

            tx.execute(Commit)
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))
                .map(drop)?;

            log::debug!("`Sale(id: {sale_id})` cancelled by `{actor_id}`");

            Ok::<_, Traced<E>>(sale)
        })
        .await
    }
}

/// Error of [`CancelSale`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Operator`] with the provided ID does not exist.
    #[display("`Operator(id: {_0})` does not exist")]
    OperatorNotExists(#[error(not(source))] operator::Id),

    /// [`Product`] of a [`Sale`] item does not exist anymore.
    #[display("`Product(id: {_0})` does not exist")]
    ProductNotExists(#[error(not(source))] product::Id),

    /// [`Sale`] is cancelled already.
    #[display("`Sale(id: {_0})` is already cancelled")]
    SaleAlreadyCancelled(#[error(not(source))] sale::Id),

    /// [`Sale`] with the provided ID does not exist.
    #[display("`Sale(id: {_0})` does not exist")]
    SaleNotExists(#[error(not(source))] sale::Id),

    /// Concurrent [`Command`]s prevented the [`Sale`] from being cancelled.
    #[display("`Sale` wasn't cancelled after {_0} attempts")]
    RetriesExhausted(#[error(not(source))] u32),
}

impl Categorize for ExecutionError {
    fn category(&self) -> Category {
        match self {
            Self::Db(_) => Category::Internal,
            Self::OperatorNotExists(_)
            | Self::ProductNotExists(_)
            | Self::SaleNotExists(_) => Category::NotFound,
            Self::SaleAlreadyCancelled(_) | Self::RetriesExhausted(_) => {
                Category::Conflict
            }
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
    use common::operations::{By, Lock, Rollback, Transact};

    use crate::{
        command::{
            fixture::{self, line, sale},
            CancelSale, CancelSaleItems, Command as _,
        },
        domain::{sale, Sale},
        error::{Categorize as _, Category},
        infra::Database as _,
    };

    use super::ExecutionError as E;

    fn reason() -> sale::Reason {
        sale::Reason::new("Customer changed their mind").unwrap()
    }

    #[tokio::test]
    async fn restores_stock_of_cancelled_sale() {
        let svc = fixture::service();
        let (operator, _) = fixture::on_shift(&svc).await;
        let coffee = fixture::product(&svc, "10.00", 5).await;

        let first = svc
            .execute(sale(&operator, vec![line(&coffee, 3, "30.00")], "30.00"))
            .await
            .unwrap();
        assert_eq!(fixture::reload(&svc, coffee.id).await.quantity.get(), 2);

        let err = svc
            .execute(sale(&operator, vec![line(&coffee, 3, "30.00")], "30.00"))
            .await
            .unwrap_err();
        assert_eq!(err.category(), Category::Conflict);

        let cancelled = svc
            .execute(CancelSale {
                sale_id: first.id,
                actor_id: operator.id,
                reason: reason(),
            })
            .await
            .unwrap();

        assert_eq!(cancelled.status(), sale::Status::Cancelled);
        assert!(cancelled.items.iter().all(sale::Item::is_cancelled));
        let cancellation = cancelled.cancellation.unwrap();
        assert_eq!(cancellation.by, operator.id);
        assert_eq!(cancellation.reason, reason());

        let coffee = fixture::reload(&svc, coffee.id).await;
        assert_eq!(coffee.quantity.get(), 5);
        assert!(coffee.is_available);
    }

    #[tokio::test]
    async fn makes_sold_out_product_available_again() {
        let svc = fixture::service();
        let (operator, _) = fixture::on_shift(&svc).await;
        let coffee = fixture::product(&svc, "10.00", 1).await;

        let sold = svc
            .execute(sale(&operator, vec![line(&coffee, 1, "10.00")], "10.00"))
            .await
            .unwrap();
        assert!(!fixture::reload(&svc, coffee.id).await.is_available);

        _ = svc
            .execute(CancelSale {
                sale_id: sold.id,
                actor_id: operator.id,
                reason: reason(),
            })
            .await
            .unwrap();

        let coffee = fixture::reload(&svc, coffee.id).await;
        assert_eq!(coffee.quantity.get(), 1);
        assert!(coffee.is_available);
    }

    #[tokio::test]
    async fn rejects_second_cancellation() {
        let svc = fixture::service();
        let (operator, _) = fixture::on_shift(&svc).await;
        let coffee = fixture::product(&svc, "10.00", 5).await;

        let sold = svc
            .execute(sale(&operator, vec![line(&coffee, 2, "20.00")], "20.00"))
            .await
            .unwrap();
        let cmd = CancelSale {
            sale_id: sold.id,
            actor_id: operator.id,
            reason: reason(),
        };
        _ = svc.execute(cmd.clone()).await.unwrap();

        let err = svc.execute(cmd).await.unwrap_err();

        assert!(matches!(err.as_ref(), E::SaleAlreadyCancelled(_)), "{err}");
        assert_eq!(err.category(), Category::Conflict);
        assert_eq!(fixture::reload(&svc, coffee.id).await.quantity.get(), 5);
    }

    #[tokio::test]
    async fn restores_recorded_quantity_regardless_of_current_stock() {
        let svc = fixture::service();
        let (operator, _) = fixture::on_shift(&svc).await;
        let coffee = fixture::product(&svc, "10.00", 5).await;

        let first = svc
            .execute(sale(&operator, vec![line(&coffee, 2, "20.00")], "20.00"))
            .await
            .unwrap();
        _ = svc
            .execute(sale(&operator, vec![line(&coffee, 1, "10.00")], "10.00"))
            .await
            .unwrap();

        _ = svc
            .execute(CancelSale {
                sale_id: first.id,
                actor_id: operator.id,
                reason: reason(),
            })
            .await
            .unwrap();

        assert_eq!(fixture::reload(&svc, coffee.id).await.quantity.get(), 4);
    }

    #[tokio::test]
    async fn skips_items_cancelled_before() {
        let svc = fixture::service();
        let (operator, _) = fixture::on_shift(&svc).await;
        let coffee = fixture::product(&svc, "10.00", 5).await;
        let tea = fixture::product(&svc, "4.00", 5).await;

        let sold = svc
            .execute(sale(
                &operator,
                vec![line(&coffee, 2, "20.00"), line(&tea, 1, "4.00")],
                "24.00",
            ))
            .await
            .unwrap();
        let coffee_item = sold
            .items
            .iter()
            .find(|i| i.product_id == coffee.id)
            .unwrap()
            .id;
        _ = svc
            .execute(CancelSaleItems {
                item_ids: vec![coffee_item],
                actor_id: operator.id,
                reason: reason(),
            })
            .await
            .unwrap();

        _ = svc
            .execute(CancelSale {
                sale_id: sold.id,
                actor_id: operator.id,
                reason: reason(),
            })
            .await
            .unwrap();

        assert_eq!(fixture::reload(&svc, coffee.id).await.quantity.get(), 5);
        assert_eq!(fixture::reload(&svc, tea.id).await.quantity.get(), 5);
    }

    #[tokio::test]
    async fn gives_up_on_sale_locked_by_another_transaction() {
        let svc = fixture::impatient_service();
        let (operator, _) = fixture::on_shift(&svc).await;
        let coffee = fixture::product(&svc, "10.00", 5).await;
        let sold = svc
            .execute(sale(&operator, vec![line(&coffee, 2, "20.00")], "20.00"))
            .await
            .unwrap();

        let other = svc.database().execute(Transact).await.unwrap();
        other.execute(Lock(By::<Sale, _>::new(sold.id))).await.unwrap();

        let err = svc
            .execute(CancelSale {
                sale_id: sold.id,
                actor_id: operator.id,
                reason: reason(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), E::RetriesExhausted(2)), "{err}");
        assert_eq!(err.category(), Category::Conflict);

        other.execute(Rollback).await.unwrap();
        assert_eq!(fixture::reload(&svc, coffee.id).await.quantity.get(), 3);
        let stored = fixture::reload_sale(&svc, sold.id).await;
        assert_eq!(stored.status(), sale::Status::Active);
    }

    #[tokio::test]
    async fn rejects_unknown_sale() {
        let svc = fixture::service();
        let operator = fixture::operator(&svc).await;

        let err = svc
            .execute(CancelSale {
                sale_id: sale::Id::new(),
                actor_id: operator.id,
                reason: reason(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), E::SaleNotExists(_)), "{err}");
        assert_eq!(err.category(), Category::NotFound);
    }
}
