//! [`WorkPeriod`]-related [`Database`] implementations.

use common::operations::{By, Insert, Select, Update};
use tokio_postgres::Row;
use tracerr::Traced;

use crate::{
    domain::{operator, work_period, WorkPeriod},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
    read,
};

/// Columns of the `work_periods` table.
const COLUMNS: &str = "\
    id, operator_id, opened_at, closed_at, sales_count, sales_total";

/// Reads a [`WorkPeriod`] from the provided [`Row`].
fn from_row(row: &Row) -> WorkPeriod {
    WorkPeriod {
        id: row.get("id"),
        operator_id: row.get("operator_id"),
        opened_at: row.get("opened_at"),
        closed_at: row.get("closed_at"),
        // `CHECK (sales_count >= 0)` holds for every stored row.
        sales_count: row.get::<_, i32>("sales_count").unsigned_abs(),
        sales_total: row.get("sales_total"),
    }
}

impl<C> Database<Select<By<Option<WorkPeriod>, work_period::Id>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<WorkPeriod>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<WorkPeriod>, work_period::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: work_period::Id = by.into_inner();

        let sql =
            format!("SELECT {COLUMNS} FROM work_periods WHERE id = $1::UUID");
        Ok(self
            .query_opt(sql.as_str(), &[&id])
            .await
            .map_err(tracerr::wrap!())?
            .as_ref()
            .map(from_row))
    }
}

impl<C>
    Database<
        Select<By<Option<read::work_period::Open<WorkPeriod>>, operator::Id>>,
    > for Postgres<C>
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
        // Avoid subtle change for SQL.
        let operator_id: operator::Id = by.into_inner();

        let sql = format!(
            "SELECT {COLUMNS} \
             FROM work_periods \
             WHERE operator_id = $1::UUID \
               AND closed_at IS NULL \
             LIMIT 1",
        );
        Ok(self
            .query_opt(sql.as_str(), &[&operator_id])
            .await
            .map_err(tracerr::wrap!())?
            .as_ref()
            .map(from_row)
            .map(read::work_period::Open))
    }
}

impl<C> Database<Insert<WorkPeriod>> for Postgres<C>
where
    C: Connection,
    Self: Database<Update<WorkPeriod>, Ok = (), Err = Traced<database::Error>>,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(period): Insert<WorkPeriod>,
    ) -> Result<Self::Ok, Self::Err> {
        self.execute(Update(period)).await.map_err(tracerr::wrap!())
    }
}

impl<C> Database<Update<WorkPeriod>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(period): Update<WorkPeriod>,
    ) -> Result<Self::Ok, Self::Err> {
        let WorkPeriod {
            id,
            operator_id,
            opened_at,
            closed_at,
            sales_count,
            sales_total,
        } = period;

        // Postgres rejects values not fitting the `INT4` column.
        let sales_count = i64::from(sales_count);

        const SQL: &str = "\
            INSERT INTO work_periods (\
                id, operator_id, opened_at, closed_at, \
                sales_count, sales_total\
            ) VALUES (\
                $1::UUID, $2::UUID, $3::TIMESTAMPTZ, $4::TIMESTAMPTZ, \
                $5::INT8, $6::NUMERIC\
            ) \
            ON CONFLICT (id) DO UPDATE \
            SET closed_at = EXCLUDED.closed_at, \
                sales_count = EXCLUDED.sales_count, \
                sales_total = EXCLUDED.sales_total";
        self.exec(
            SQL,
            &[
                &id,
                &operator_id,
                &opened_at,
                &closed_at,
                &sales_count,
                &sales_total,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C> Database<Update<work_period::Accrual>> for Postgres<C>
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

        let sql = format!(
            "UPDATE work_periods \
             SET sales_count = sales_count + 1, \
                 sales_total = sales_total + $2::NUMERIC \
             WHERE id = $1::UUID \
               AND closed_at IS NULL \
             RETURNING {COLUMNS}",
        );
        Ok(self
            .query_opt(sql.as_str(), &[&work_period_id, &amount])
            .await
            .map_err(tracerr::wrap!())?
            .as_ref()
            .map(from_row))
    }
}
