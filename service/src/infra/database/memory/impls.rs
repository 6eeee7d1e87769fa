//! [`Database`] implementations of the [`Memory`] database.

use std::{collections::HashMap, ops::RangeInclusive};

use common::operations::{By, Insert, Lock, Select, Update};
use tracerr::Traced;

use crate::{
    domain::{
        operator, product, sale, work_period, Operator, Product, Sale,
        WorkPeriod,
    },
    infra::{
        database::{
            self,
            memory::{Connection, Error, LockKey, Tables},
            Memory,
        },
        Database,
    },
    read,
};

impl<C> Database<Select<By<Option<Operator>, operator::Id>>> for Memory<C>
where
    C: Connection,
{
    type Ok = Option<Operator>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Operator>, operator::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self.read(|v| v.operator(id).cloned()).await)
    }
}

impl<C> Database<Insert<Operator>> for Memory<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(operator): Insert<Operator>,
    ) -> Result<Self::Ok, Self::Err> {
        self.apply(|_| {
            let mut rows = Tables::default();
            _ = rows.operators.insert(operator.id, operator);
            ((), rows)
        })
        .await;
        Ok(())
    }
}

impl<C> Database<Lock<By<Operator, operator::Id>>> for Memory<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(by): Lock<By<Operator, operator::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        self.lock(LockKey::Operator(by.into_inner()))
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<C> Database<Select<By<Option<Product>, product::Id>>> for Memory<C>
where
    C: Connection,
{
    type Ok = Option<Product>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Product>, product::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self.read(|v| v.product(id).cloned()).await)
    }
}

impl<C> Database<Insert<Product>> for Memory<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(product): Insert<Product>,
    ) -> Result<Self::Ok, Self::Err> {
        self.apply(|_| {
            let mut rows = Tables::default();
            _ = rows.products.insert(product.id, product);
            ((), rows)
        })
        .await;
        Ok(())
    }
}

impl<C> Database<Update<Product>> for Memory<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(product): Update<Product>,
    ) -> Result<Self::Ok, Self::Err> {
        self.execute(Insert(product)).await
    }
}

impl<C> Database<Lock<By<Product, product::Id>>> for Memory<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(by): Lock<By<Product, product::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        self.lock(LockKey::Product(by.into_inner()))
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<C> Database<Update<product::Withdrawal>> for Memory<C>
where
    C: Connection,
{
    /// Updated [`Product`], if it exists and has enough stock.
    type Ok = Option<Product>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(withdrawal): Update<product::Withdrawal>,
    ) -> Result<Self::Ok, Self::Err> {
        let product::Withdrawal {
            product_id,
            quantity,
        } = withdrawal;

        self.lock(LockKey::Product(product_id))
            .await
            .map_err(tracerr::wrap!())?;
        Ok(self
            .apply(|v| {
                let mut rows = Tables::default();
                let Some(mut product) = v.product(product_id).cloned() else {
                    return (None, rows);
                };
                let Some(rest) = product.quantity.checked_sub(quantity) else {
                    return (None, rows);
                };
                product.set_quantity(rest);
                _ = rows.products.insert(product_id, product.clone());
                (Some(product), rows)
            })
            .await)
    }
}

impl<C> Database<Update<product::Restock>> for Memory<C>
where
    C: Connection,
{
    /// Updated [`Product`], if it exists.
    type Ok = Option<Product>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(restock): Update<product::Restock>,
    ) -> Result<Self::Ok, Self::Err> {
        let product::Restock {
            product_id,
            quantity,
        } = restock;

        self.lock(LockKey::Product(product_id))
            .await
            .map_err(tracerr::wrap!())?;
        self.apply(|v| {
            let mut rows = Tables::default();
            let Some(mut product) = v.product(product_id).cloned() else {
                return (Ok(None), rows);
            };
            let Some(total) = product.quantity.checked_add(quantity) else {
                return (
                    Err(tracerr::new!(database::Error::from(
                        Error::QuantityOverflow(product_id),
                    ))),
                    rows,
                );
            };
            product.set_quantity(total);
            _ = rows.products.insert(product_id, product.clone());
            (Ok(Some(product)), rows)
        })
        .await
    }
}

impl<C> Database<Select<By<Option<WorkPeriod>, work_period::Id>>> for Memory<C>
where
    C: Connection,
{
    type Ok = Option<WorkPeriod>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<WorkPeriod>, work_period::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self.read(|v| v.work_period(id).cloned()).await)
    }
}

impl<C>
    Database<
        Select<By<Option<read::work_period::Open<WorkPeriod>>, operator::Id>>,
    > for Memory<C>
where
    C: Connection,
{
    type Ok = Option<read::work_period::Open<WorkPeriod>>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<
            By<Option<read::work_period::Open<WorkPeriod>>, operator::Id>,
        >,
    ) -> Result<Self::Ok, Self::Err> {
        let operator_id = by.into_inner();
        Ok(self
            .read(|v| {
                v.work_periods()
                    .find(|p| p.operator_id == operator_id && p.is_open())
                    .cloned()
                    .map(read::work_period::Open)
            })
            .await)
    }
}

impl<C> Database<Insert<WorkPeriod>> for Memory<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(period): Insert<WorkPeriod>,
    ) -> Result<Self::Ok, Self::Err> {
        self.apply(|_| {
            let mut rows = Tables::default();
            _ = rows.work_periods.insert(period.id, period);
            ((), rows)
        })
        .await;
        Ok(())
    }
}

impl<C> Database<Update<WorkPeriod>> for Memory<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(period): Update<WorkPeriod>,
    ) -> Result<Self::Ok, Self::Err> {
        self.execute(Insert(period)).await
    }
}

impl<C> Database<Update<work_period::Accrual>> for Memory<C>
where
    C: Connection,
{
    /// Updated [`WorkPeriod`], if it exists and is still open.
    type Ok = Option<WorkPeriod>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(accrual): Update<work_period::Accrual>,
    ) -> Result<Self::Ok, Self::Err> {
        let work_period::Accrual {
            work_period_id,
            amount,
        } = accrual;

        Ok(self
            .apply(|v| {
                let mut rows = Tables::default();
                let Some(mut period) = v
                    .work_period(work_period_id)
                    .filter(|p| p.is_open())
                    .cloned()
                else {
                    return (None, rows);
                };
                period.sales_count = period.sales_count.saturating_add(1);
                period.sales_total += amount;
                _ = rows.work_periods.insert(work_period_id, period.clone());
                (Some(period), rows)
            })
            .await)
    }
}

impl<C> Database<Select<By<Option<Sale>, sale::Id>>> for Memory<C>
where
    C: Connection,
{
    type Ok = Option<Sale>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Sale>, sale::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self.read(|v| v.sale(id).cloned()).await)
    }
}

impl<C>
    Database<Select<By<Vec<Sale>, RangeInclusive<sale::CreationDateTime>>>>
    for Memory<C>
where
    C: Connection,
{
    type Ok = Vec<Sale>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<
            By<Vec<Sale>, RangeInclusive<sale::CreationDateTime>>,
        >,
    ) -> Result<Self::Ok, Self::Err> {
        let range = by.into_inner();
        let mut sales = self
            .read(|v| {
                v.sales()
                    .filter(|s| range.contains(&s.created_at))
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .await;
        sales.sort_by_key(|s| (s.created_at, s.id));
        Ok(sales)
    }
}

impl<C, IDs> Database<Select<By<HashMap<sale::item::Id, sale::Item>, IDs>>>
    for Memory<C>
where
    C: Connection,
    IDs: AsRef<[sale::item::Id]>,
{
    type Ok = HashMap<sale::item::Id, sale::Item>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<HashMap<sale::item::Id, sale::Item>, IDs>>,
    ) -> Result<Self::Ok, Self::Err> {
        let ids = by.into_inner();
        let ids: &[sale::item::Id] = ids.as_ref();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        Ok(self
            .read(|v| {
                v.sales()
                    .flat_map(|s| &s.items)
                    .filter(|i| ids.contains(&i.id))
                    .map(|i| (i.id, i.clone()))
                    .collect()
            })
            .await)
    }
}

impl<C> Database<Insert<Sale>> for Memory<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(sale): Insert<Sale>,
    ) -> Result<Self::Ok, Self::Err> {
        self.apply(|_| {
            let mut rows = Tables::default();
            _ = rows.sales.insert(sale.id, sale);
            ((), rows)
        })
        .await;
        Ok(())
    }
}

impl<C> Database<Update<Sale>> for Memory<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(sale): Update<Sale>,
    ) -> Result<Self::Ok, Self::Err> {
        self.execute(Insert(sale)).await
    }
}

impl<C> Database<Lock<By<Sale, sale::Id>>> for Memory<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(by): Lock<By<Sale, sale::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        self.lock(LockKey::Sale(by.into_inner()))
            .await
            .map_err(tracerr::wrap!())
    }
}

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use common::{
        operations::{By, Commit, Insert, Lock, Select, Transact, Update},
        DateTime, Money,
    };

    use crate::{
        domain::{product, Product},
        infra::{Database, Memory},
    };

    fn product(quantity: i32) -> Product {
        Product {
            id: product::Id::new(),
            name: product::Name::new("Coffee").unwrap(),
            price: "2.50".parse::<Money>().unwrap(),
            quantity: product::Quantity::new(quantity).unwrap(),
            is_available: quantity > 0,
            created_at: DateTime::now().coerce(),
        }
    }

    async fn select(db: &Memory, id: product::Id) -> Option<Product> {
        db.execute(Select(By::<Option<Product>, _>::new(id)))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn hides_uncommitted_writes() {
        let db = Memory::default();
        let p = product(5);
        db.execute(Insert(p.clone())).await.unwrap();

        let tx = db.execute(Transact).await.unwrap();
        let updated = tx
            .execute(Update(product::Withdrawal {
                product_id: p.id,
                quantity: product::Quantity::new(2).unwrap(),
            }))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.quantity.get(), 3);
        assert_eq!(select(&db, p.id).await.unwrap().quantity.get(), 5);

        tx.execute(Commit).await.unwrap();
        assert_eq!(select(&db, p.id).await.unwrap().quantity.get(), 3);
    }

    #[tokio::test]
    async fn discards_dropped_transaction() {
        let db = Memory::default();
        let p = product(5);
        db.execute(Insert(p.clone())).await.unwrap();

        {
            let tx = db.execute(Transact).await.unwrap();
            _ = tx
                .execute(Update(product::Withdrawal {
                    product_id: p.id,
                    quantity: product::Quantity::new(5).unwrap(),
                }))
                .await
                .unwrap();
        }

        let p = select(&db, p.id).await.unwrap();
        assert_eq!(p.quantity.get(), 5);
        assert!(p.is_available);
    }

    #[tokio::test]
    async fn refuses_withdrawal_beyond_stock() {
        let db = Memory::default();
        let p = product(2);
        db.execute(Insert(p.clone())).await.unwrap();

        let res = db
            .execute(Update(product::Withdrawal {
                product_id: p.id,
                quantity: product::Quantity::new(3).unwrap(),
            }))
            .await
            .unwrap();
        assert!(res.is_none());

        let res = db
            .execute(Update(product::Withdrawal {
                product_id: p.id,
                quantity: product::Quantity::new(2).unwrap(),
            }))
            .await
            .unwrap()
            .unwrap();
        assert!(res.quantity.is_zero());
        assert!(!res.is_available);
    }

    #[tokio::test]
    async fn times_out_on_held_lock() {
        let db = Memory::new(Duration::from_millis(20));
        let p = product(1);
        db.execute(Insert(p.clone())).await.unwrap();

        let first = db.execute(Transact).await.unwrap();
        first
            .execute(Lock(By::<Product, _>::new(p.id)))
            .await
            .unwrap();

        let second = db.execute(Transact).await.unwrap();
        let err = second
            .execute(Lock(By::<Product, _>::new(p.id)))
            .await
            .unwrap_err();
        assert!(err.as_ref().is_transient());

        first.execute(Commit).await.unwrap();
        second
            .execute(Lock(By::<Product, _>::new(p.id)))
            .await
            .unwrap();
    }
}
