//! [`Sale`]-related [`Database`] implementations.

use std::{collections::HashMap, ops::RangeInclusive};

use common::operations::{By, Insert, Lock, Select, Update};
use itertools::Itertools as _;
use tokio_postgres::Row;
use tracerr::Traced;

use crate::{
    domain::{sale, Sale},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
};

/// Columns of the `sale_items` table.
const ITEM_COLUMNS: &str = "\
    id, sale_id, product_id, product_name, unit_price, quantity, subtotal, \
    stock_before, stock_after, \
    cancelled_by, cancelled_at, cancellation_reason";

/// Reads a [`sale::Cancellation`] from the provided [`Row`], if any.
fn cancellation_from_row(row: &Row) -> Option<sale::Cancellation> {
    row.get::<_, Option<sale::CancellationDateTime>>("cancelled_at")
        .map(|at| sale::Cancellation {
            by: row.get("cancelled_by"),
            at,
            reason: row.get("cancellation_reason"),
        })
}

/// Reads a [`sale::Item`] from the provided [`Row`].
fn item_from_row(row: &Row) -> sale::Item {
    sale::Item {
        id: row.get("id"),
        sale_id: row.get("sale_id"),
        product_id: row.get("product_id"),
        product_name: row.get("product_name"),
        unit_price: row.get("unit_price"),
        quantity: row.get("quantity"),
        subtotal: row.get("subtotal"),
        stock_before: row.get("stock_before"),
        stock_after: row.get("stock_after"),
        cancellation: cancellation_from_row(row),
    }
}

impl<C, IDs> Database<Select<By<HashMap<sale::Id, Sale>, IDs>>> for Postgres<C>
where
    C: Connection,
    IDs: AsRef<[sale::Id]>,
{
    type Ok = HashMap<sale::Id, Sale>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<HashMap<sale::Id, Sale>, IDs>>,
    ) -> Result<Self::Ok, Self::Err> {
        let ids = by.into_inner();
        // Avoid subtle change for SQL.
        let ids: &[sale::Id] = ids.as_ref();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let sql = format!(
            "SELECT {ITEM_COLUMNS} \
             FROM sale_items \
             WHERE sale_id = ANY($1::UUID[]) \
             ORDER BY sale_id, product_id",
        );
        let mut items = self
            .query(sql.as_str(), &[&ids])
            .await
            .map_err(tracerr::wrap!())?
            .iter()
            .map(item_from_row)
            .into_group_map_by(|i| i.sale_id);

        const SQL: &str = "\
            SELECT id, operator_id, work_period_id, total, payment_method, \
                   customer, created_at, \
                   cancelled_by, cancelled_at, cancellation_reason \
            FROM sales \
            WHERE id = ANY($1::UUID[])";
        Ok(self
            .query(SQL, &[&ids])
            .await
            .map_err(tracerr::wrap!())?
            .into_iter()
            .map(|row| {
                let id = row.get("id");
                (
                    id,
                    Sale {
                        id,
                        operator_id: row.get("operator_id"),
                        work_period_id: row.get("work_period_id"),
                        items: items.remove(&id).unwrap_or_default(),
                        total: row.get("total"),
                        payment_method: row.get("payment_method"),
                        customer: row.get("customer"),
                        created_at: row.get("created_at"),
                        cancellation: cancellation_from_row(&row),
                    },
                )
            })
            .collect())
    }
}

impl<C> Database<Select<By<Option<Sale>, sale::Id>>> for Postgres<C>
where
    C: Connection,
    Self: Database<
        Select<By<HashMap<sale::Id, Sale>, [sale::Id; 1]>>,
        Ok = HashMap<sale::Id, Sale>,
        Err = Traced<database::Error>,
    >,
{
    type Ok = Option<Sale>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Sale>, sale::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self
            .execute(Select(By::new([id])))
            .await
            .map_err(tracerr::wrap!())?
            .remove(&id))
    }
}

impl<C>
    Database<Select<By<Vec<Sale>, RangeInclusive<sale::CreationDateTime>>>>
    for Postgres<C>
where
    C: Connection,
    Self: Database<
        Select<By<HashMap<sale::Id, Sale>, Vec<sale::Id>>>,
        Ok = HashMap<sale::Id, Sale>,
        Err = Traced<database::Error>,
    >,
{
    type Ok = Vec<Sale>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<
            By<Vec<Sale>, RangeInclusive<sale::CreationDateTime>>,
        >,
    ) -> Result<Self::Ok, Self::Err> {
        let (from, to) = by.into_inner().into_inner();

        const SQL: &str = "\
            SELECT id \
            FROM sales \
            WHERE created_at BETWEEN $1::TIMESTAMPTZ AND $2::TIMESTAMPTZ \
            ORDER BY created_at, id";
        let ids = self
            .query(SQL, &[&from, &to])
            .await
            .map_err(tracerr::wrap!())?
            .into_iter()
            .map(|row| row.get::<_, sale::Id>("id"))
            .collect::<Vec<_>>();

        let mut sales = self
            .execute(Select(By::new(ids.clone())))
            .await
            .map_err(tracerr::wrap!())?;
        Ok(ids.into_iter().filter_map(|id| sales.remove(&id)).collect())
    }
}

impl<C, IDs> Database<Select<By<HashMap<sale::item::Id, sale::Item>, IDs>>>
    for Postgres<C>
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
        // Avoid subtle change for SQL.
        let ids: &[sale::item::Id] = ids.as_ref();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let sql = format!(
            "SELECT {ITEM_COLUMNS} \
             FROM sale_items \
             WHERE id = ANY($1::UUID[])",
        );
        Ok(self
            .query(sql.as_str(), &[&ids])
            .await
            .map_err(tracerr::wrap!())?
            .iter()
            .map(|row| {
                let item = item_from_row(row);
                (item.id, item)
            })
            .collect())
    }
}

impl<C> Database<Insert<Sale>> for Postgres<C>
where
    C: Connection,
    Self: Database<Update<Sale>, Ok = (), Err = Traced<database::Error>>,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(sale): Insert<Sale>,
    ) -> Result<Self::Ok, Self::Err> {
        self.execute(Update(sale)).await.map_err(tracerr::wrap!())
    }
}

impl<C> Database<Update<Sale>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(sale): Update<Sale>,
    ) -> Result<Self::Ok, Self::Err> {
        let Sale {
            id,
            operator_id,
            work_period_id,
            items,
            total,
            payment_method,
            customer,
            created_at,
            cancellation,
        } = sale;

        let cancelled_by = cancellation.as_ref().map(|c| c.by);
        let cancelled_at = cancellation.as_ref().map(|c| c.at);
        let cancellation_reason = cancellation.map(|c| c.reason);

        const SQL: &str = "\
            INSERT INTO sales (\
                id, operator_id, work_period_id, total, payment_method, \
                customer, created_at, \
                cancelled_by, cancelled_at, cancellation_reason\
            ) VALUES (\
                $1::UUID, $2::UUID, $3::UUID, $4::NUMERIC, $5::INT2, \
                $6::VARCHAR, $7::TIMESTAMPTZ, \
                $8::UUID, $9::TIMESTAMPTZ, $10::VARCHAR\
            ) \
            ON CONFLICT (id) DO UPDATE \
            SET cancelled_by = EXCLUDED.cancelled_by, \
                cancelled_at = EXCLUDED.cancelled_at, \
                cancellation_reason = EXCLUDED.cancellation_reason";
        self.exec(
            SQL,
            &[
                &id,
                &operator_id,
                &work_period_id,
                &total,
                &payment_method,
                &customer,
                &created_at,
                &cancelled_by,
                &cancelled_at,
                &cancellation_reason,
            ],
        )
        .await
        .map_err(tracerr::wrap!())?;

        for item in items {
            let sale::Item {
                id,
                sale_id,
                product_id,
                product_name,
                unit_price,
                quantity,
                subtotal,
                stock_before,
                stock_after,
                cancellation,
            } = item;

            let cancelled_by = cancellation.as_ref().map(|c| c.by);
            let cancelled_at = cancellation.as_ref().map(|c| c.at);
            let cancellation_reason = cancellation.map(|c| c.reason);

            const SQL: &str = "\
                INSERT INTO sale_items (\
                    id, sale_id, product_id, product_name, \
                    unit_price, quantity, subtotal, \
                    stock_before, stock_after, \
                    cancelled_by, cancelled_at, cancellation_reason\
                ) VALUES (\
                    $1::UUID, $2::UUID, $3::UUID, $4::VARCHAR, \
                    $5::NUMERIC, $6::INT4, $7::NUMERIC, \
                    $8::INT4, $9::INT4, \
                    $10::UUID, $11::TIMESTAMPTZ, $12::VARCHAR\
                ) \
                ON CONFLICT (id) DO UPDATE \
                SET cancelled_by = EXCLUDED.cancelled_by, \
                    cancelled_at = EXCLUDED.cancelled_at, \
                    cancellation_reason = EXCLUDED.cancellation_reason";
            self.exec(
                SQL,
                &[
                    &id,
                    &sale_id,
                    &product_id,
                    &product_name,
                    &unit_price,
                    &quantity,
                    &subtotal,
                    &stock_before,
                    &stock_after,
                    &cancelled_by,
                    &cancelled_at,
                    &cancellation_reason,
                ],
            )
            .await
            .map_err(tracerr::wrap!())?;
        }

        Ok(())
    }
}

impl<C> Database<Lock<By<Sale, sale::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(by): Lock<By<Sale, sale::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: sale::Id = by.into_inner();

        const SQL: &str = "\
            SELECT id \
            FROM sales \
            WHERE id = $1::UUID \
            FOR UPDATE";
        self.query_opt(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}
