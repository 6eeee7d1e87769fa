//! [`Command`] for cancelling separate items of [`Sale`]s.

use std::collections::{BTreeMap, HashMap};

use common::{
    operations::{By, Commit, Lock, Select, Transact, Transacted, Update},
    DateTime,
};
use derive_more::{Display, Error, From};
use itertools::Itertools as _;
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{operator, product, sale, Operator, Product, Sale},
    error::{Categorize, Category},
    infra::{database, Database},
    Service,
};

use super::{Command, Retryable};

/// [`Command`] for cancelling separate items of [`Sale`]s.
///
/// Every cancelled item returns its stock and gets its own
/// [`sale::Cancellation`]. A [`Sale`] whose items all end up cancelled is
/// cancelled as well.
#[derive(Clone, Debug)]
pub struct CancelSaleItems {
    /// IDs of the [`sale::Item`]s to cancel.
    pub item_ids: Vec<sale::item::Id>,

    /// ID of the [`Operator`] cancelling the items.
    pub actor_id: operator::Id,

    /// [`sale::Reason`] of the cancellation.
    pub reason: sale::Reason,
}

impl<Db> Command<CancelSaleItems> for Service<Db>
where
    Db: Database<Transact, Err = Traced<database::Error>>
        + Database<
            Select<By<Option<Operator>, operator::Id>>,
            Ok = Option<Operator>,
            Err = Traced<database::Error>,
        >,
    Transacted<Db>: Database<
            Select<By<HashMap<sale::item::Id, sale::Item>, ItemIds>>,
            Ok = HashMap<sale::item::Id, sale::Item>,
            Err = Traced<database::Error>,
        > + Database<Lock<By<Sale, sale::Id>>, Err = Traced<database::Error>>
        + Database<
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
    type Ok = Vec<sale::Item>;
    type Err = Traced<ExecutionError>;

    #[expect(clippy::too_many_lines, reason = "still readable")]
    async fn execute(
        &self,
        cmd: CancelSaleItems,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CancelSaleItems {
            item_ids,
            actor_id,
            reason,
        } = cmd;

        let item_ids = item_ids.into_iter().unique().collect::<Vec<_>>();
        if item_ids.is_empty() {
            return Err(tracerr::new!(E::NoItems));
        }

        self.database()
            .execute(Select(By::<Option<Operator>, _>::new(actor_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::OperatorNotExists(actor_id))
            .map_err(tracerr::wrap!())?;

        let item_ids = &item_ids;
        let reason = &reason;
        self.retry(|| async move {
            let tx = self
                .database()
                .execute(Transact)
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?;

            let items = tx
                .execute(Select(By::<HashMap<_, _>, _>::new(item_ids.clone())))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?;
            let mut sale_ids = Vec::with_capacity(items.len());
            for id in item_ids {
                let item = items
                    .get(id)
                    .ok_or(E::ItemNotExists(*id))
                    .map_err(tracerr::wrap!())?;
                sale_ids.push(item.sale_id);
            }

            // Ordered by `sale::Id` to lock `Sale`s in the same order in
            // every transaction.
            let mut sales = BTreeMap::new();
            for sale_id in sale_ids.into_iter().sorted().dedup() {
                tx.execute(Lock(By::<Sale, _>::new(sale_id)))
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))
                    .map(drop)?;

                let sale = tx
                    .execute(Select(By::<Option<Sale>, _>::new(sale_id)))
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))?
                    .ok_or(E::SaleNotExists(sale_id))
                    .map_err(tracerr::wrap!())?;
                if sale.is_cancelled() {
                    return Err(tracerr::new!(E::SaleAlreadyCancelled(
                        sale_id
                    )));
                }
                _ = sales.insert(sale_id, sale);
            }

            let cancellation = sale::Cancellation {
                by: actor_id,
                at: DateTime::now().coerce(),
                reason: reason.clone(),
            };
            let mut restocks = Vec::with_capacity(item_ids.len());
            for id in item_ids {
                let item = sales
                    .get_mut(&items[id].sale_id)
                    .and_then(|s| s.item_mut(*id))
                    .ok_or(E::ItemNotExists(*id))
                    .map_err(tracerr::wrap!())?;
                if item.is_cancelled() {
                    return Err(tracerr::new!(E::ItemAlreadyCancelled(*id)));
                }
                item.cancellation = Some(cancellation.clone());
                restocks.push(product::Restock {
                    product_id: item.product_id,
                    quantity: item.quantity,
                });
            }

            restocks.sort_by_key(|r| r.product_id);
            for restock in restocks {
                tx.execute(Update(restock))
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))?
                    .ok_or(E::ProductNotExists(restock.product_id))
                    .map_err(tracerr::wrap!())?;
            }

            for sale in sales.values_mut() {
                if sale.are_all_items_cancelled() {
                    sale.cancellation = Some(cancellation.clone());
                }
                tx.execute(Update(sale.clone()))
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))
                    .map(drop)?;
            }

            tx.execute(Commit)
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))
                .map(drop)?;

            log::debug!(
                "{} `sale::Item`s cancelled by `{actor_id}`",
                item_ids.len(),
            );

            Ok::<_, Traced<E>>(
                item_ids
                    .iter()
                    .filter_map(|id| {
                        sales
                            .get(&items[id].sale_id)?
                            .items
                            .iter()
                            .find(|i| i.id == *id)
                            .cloned()
                    })
                    .collect(),
            )
        })
        .await
    }
}

/// IDs of [`sale::Item`]s to be selected at once.
type ItemIds = Vec<sale::item::Id>;

/// Error of [`CancelSaleItems`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// No items to cancel were provided.
    #[display("At least one `sale::Item` must be provided")]
    NoItems,

    /// [`sale::Item`] is cancelled already.
    #[display("`sale::Item(id: {_0})` is already cancelled")]
    ItemAlreadyCancelled(#[error(not(source))] sale::item::Id),

    /// [`sale::Item`] with the provided ID does not exist.
    #[display("`sale::Item(id: {_0})` does not exist")]
    ItemNotExists(#[error(not(source))] sale::item::Id),

    /// [`Operator`] with the provided ID does not exist.
    #[display("`Operator(id: {_0})` does not exist")]
    OperatorNotExists(#[error(not(source))] operator::Id),

    /// [`Product`] of a [`sale::Item`] does not exist anymore.
    #[display("`Product(id: {_0})` does not exist")]
    ProductNotExists(#[error(not(source))] product::Id),

    /// [`Sale`] of a [`sale::Item`] is cancelled already.
    #[display("`Sale(id: {_0})` is already cancelled")]
    SaleAlreadyCancelled(#[error(not(source))] sale::Id),

    /// [`Sale`] of a [`sale::Item`] does not exist.
    #[display("`Sale(id: {_0})` does not exist")]
    SaleNotExists(#[error(not(source))] sale::Id),

    /// Concurrent [`Command`]s prevented the items from being cancelled.
    #[display("`sale::Item`s weren't cancelled after {_0} attempts")]
    RetriesExhausted(#[error(not(source))] u32),
}

impl Categorize for ExecutionError {
    fn category(&self) -> Category {
        match self {
            Self::Db(_) => Category::Internal,
            Self::NoItems => Category::Validation,
            Self::ItemNotExists(_)
            | Self::OperatorNotExists(_)
            | Self::ProductNotExists(_)
            | Self::SaleNotExists(_) => Category::NotFound,
            Self::ItemAlreadyCancelled(_)
            | Self::SaleAlreadyCancelled(_)
            | Self::RetriesExhausted(_) => Category::Conflict,
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
    use crate::{
        command::{
            fixture::{self, line, sale},
            CancelSaleItems, Command as _,
        },
        domain::{sale, Product, Sale},
        error::{Categorize as _, Category},
    };

    use super::ExecutionError as E;

    fn reason() -> sale::Reason {
        sale::Reason::new("Damaged package").unwrap()
    }

    fn item_of(sale: &Sale, product: &Product) -> sale::item::Id {
        sale.items
            .iter()
            .find(|i| i.product_id == product.id)
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn restores_stock_of_cancelled_items_only() {
        let svc = fixture::service();
        let (operator, _) = fixture::on_shift(&svc).await;
        let coffee = fixture::product(&svc, "10.00", 5).await;
        let tea = fixture::product(&svc, "4.00", 5).await;

        let sold = svc
            .execute(sale(
                &operator,
                vec![line(&coffee, 2, "20.00"), line(&tea, 3, "12.00")],
                "32.00",
            ))
            .await
            .unwrap();

        let cancelled = svc
            .execute(CancelSaleItems {
                item_ids: vec![item_of(&sold, &coffee)],
                actor_id: operator.id,
                reason: reason(),
            })
            .await
            .unwrap();

        assert_eq!(cancelled.len(), 1);
        assert!(cancelled[0].is_cancelled());
        assert_eq!(cancelled[0].cancellation.as_ref().unwrap().by, operator.id);
        assert_eq!(fixture::reload(&svc, coffee.id).await.quantity.get(), 5);
        assert_eq!(fixture::reload(&svc, tea.id).await.quantity.get(), 2);

        let sold = fixture::reload_sale(&svc, sold.id).await;
        assert!(!sold.is_cancelled());
        let tea_item = item_of(&sold, &tea);
        assert!(
            sold.items.iter().any(|i| i.id == tea_item && !i.is_cancelled()),
        );
    }

    #[tokio::test]
    async fn cancels_sale_once_all_items_are_cancelled() {
        let svc = fixture::service();
        let (operator, _) = fixture::on_shift(&svc).await;
        let coffee = fixture::product(&svc, "10.00", 5).await;
        let tea = fixture::product(&svc, "4.00", 5).await;

        let sold = svc
            .execute(sale(
                &operator,
                vec![line(&coffee, 1, "10.00"), line(&tea, 1, "4.00")],
                "14.00",
            ))
            .await
            .unwrap();

        _ = svc
            .execute(CancelSaleItems {
                item_ids: vec![item_of(&sold, &coffee)],
                actor_id: operator.id,
                reason: reason(),
            })
            .await
            .unwrap();
        _ = svc
            .execute(CancelSaleItems {
                item_ids: vec![item_of(&sold, &tea)],
                actor_id: operator.id,
                reason: reason(),
            })
            .await
            .unwrap();

        let sold = fixture::reload_sale(&svc, sold.id).await;
        assert_eq!(sold.status(), sale::Status::Cancelled);
        assert_eq!(fixture::reload(&svc, coffee.id).await.quantity.get(), 5);
        assert_eq!(fixture::reload(&svc, tea.id).await.quantity.get(), 5);
    }

    #[tokio::test]
    async fn rejects_already_cancelled_item() {
        let svc = fixture::service();
        let (operator, _) = fixture::on_shift(&svc).await;
        let coffee = fixture::product(&svc, "10.00", 5).await;
        let tea = fixture::product(&svc, "4.00", 5).await;

        let sold = svc
            .execute(sale(
                &operator,
                vec![line(&coffee, 1, "10.00"), line(&tea, 1, "4.00")],
                "14.00",
            ))
            .await
            .unwrap();
        let cmd = CancelSaleItems {
            item_ids: vec![item_of(&sold, &coffee)],
            actor_id: operator.id,
            reason: reason(),
        };
        _ = svc.execute(cmd.clone()).await.unwrap();

        let err = svc.execute(cmd).await.unwrap_err();

        assert!(matches!(err.as_ref(), E::ItemAlreadyCancelled(_)), "{err}");
        assert_eq!(err.category(), Category::Conflict);
        assert_eq!(fixture::reload(&svc, coffee.id).await.quantity.get(), 5);
    }

    #[tokio::test]
    async fn rejects_unknown_item_without_partial_effect() {
        let svc = fixture::service();
        let (operator, _) = fixture::on_shift(&svc).await;
        let coffee = fixture::product(&svc, "10.00", 5).await;

        let sold = svc
            .execute(sale(&operator, vec![line(&coffee, 2, "20.00")], "20.00"))
            .await
            .unwrap();

        let err = svc
            .execute(CancelSaleItems {
                item_ids: vec![item_of(&sold, &coffee), sale::item::Id::new()],
                actor_id: operator.id,
                reason: reason(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), E::ItemNotExists(_)), "{err}");
        assert_eq!(err.category(), Category::NotFound);
        assert_eq!(fixture::reload(&svc, coffee.id).await.quantity.get(), 3);
    }

    #[tokio::test]
    async fn rejects_empty_request() {
        let svc = fixture::service();
        let operator = fixture::operator(&svc).await;

        let err = svc
            .execute(CancelSaleItems {
                item_ids: vec![],
                actor_id: operator.id,
                reason: reason(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), E::NoItems), "{err}");
        assert_eq!(err.category(), Category::Validation);
    }
}
