//! [`Product`]-related [`Database`] implementations.

use common::operations::{By, Insert, Lock, Select, Update};
use tokio_postgres::Row;
use tracerr::Traced;

use crate::{
    domain::{product, Product},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
};

/// Columns of the `products` table.
const COLUMNS: &str = "id, name, price, quantity, is_available, created_at";

/// Reads a [`Product`] from the provided [`Row`].
fn from_row(row: &Row) -> Product {
    Product {
        id: row.get("id"),
        name: row.get("name"),
        price: row.get("price"),
        quantity: row.get("quantity"),
        is_available: row.get("is_available"),
        created_at: row.get("created_at"),
    }
}

impl<C> Database<Select<By<Option<Product>, product::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Product>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Product>, product::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: product::Id = by.into_inner();

        let sql = format!("SELECT {COLUMNS} FROM products WHERE id = $1::UUID");
        Ok(self
            .query_opt(sql.as_str(), &[&id])
            .await
            .map_err(tracerr::wrap!())?
            .as_ref()
            .map(from_row))
    }
}

impl<C> Database<Insert<Product>> for Postgres<C>
where
    C: Connection,
    Self: Database<Update<Product>, Ok = (), Err = Traced<database::Error>>,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(product): Insert<Product>,
    ) -> Result<Self::Ok, Self::Err> {
        self.execute(Update(product)).await.map_err(tracerr::wrap!())
    }
}

impl<C> Database<Update<Product>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(product): Update<Product>,
    ) -> Result<Self::Ok, Self::Err> {
        let Product {
            id,
            name,
            price,
            quantity,
            is_available,
            created_at,
        } = product;

        const SQL: &str = "\
            INSERT INTO products (\
                id, name, price, quantity, is_available, created_at\
            ) VALUES (\
                $1::UUID, $2::VARCHAR, $3::NUMERIC, $4::INT4, $5::BOOLEAN, \
                $6::TIMESTAMPTZ\
            ) \
            ON CONFLICT (id) DO UPDATE \
            SET name = EXCLUDED.name, \
                price = EXCLUDED.price, \
                quantity = EXCLUDED.quantity, \
                is_available = EXCLUDED.is_available";
        self.exec(
            SQL,
            &[&id, &name, &price, &quantity, &is_available, &created_at],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C> Database<Lock<By<Product, product::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(by): Lock<By<Product, product::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: product::Id = by.into_inner();

        const SQL: &str = "\
            SELECT id \
            FROM products \
            WHERE id = $1::UUID \
            FOR UPDATE";
        self.query_opt(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}

impl<C> Database<Update<product::Withdrawal>> for Postgres<C>
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

        let sql = format!(
            "UPDATE products \
             SET quantity = quantity - $2::INT4, \
                 is_available = quantity - $2::INT4 > 0 \
             WHERE id = $1::UUID \
               AND quantity >= $2::INT4 \
             RETURNING {COLUMNS}",
        );
        Ok(self
            .query_opt(sql.as_str(), &[&product_id, &quantity])
            .await
            .map_err(tracerr::wrap!())?
            .as_ref()
            .map(from_row))
    }
}

impl<C> Database<Update<product::Restock>> for Postgres<C>
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

        let sql = format!(
            "UPDATE products \
             SET quantity = quantity + $2::INT4, \
                 is_available = quantity + $2::INT4 > 0 \
             WHERE id = $1::UUID \
             RETURNING {COLUMNS}",
        );
        Ok(self
            .query_opt(sql.as_str(), &[&product_id, &quantity])
            .await
            .map_err(tracerr::wrap!())?
            .as_ref()
            .map(from_row))
    }
}
