//! [`Tx`] client definitions.

use std::sync::Arc;

use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};
use tokio_postgres::{types::ToSql, Row, ToStatement};
use tracerr::Traced;

use crate::infra::database::{
    self,
    postgres::{
        self,
        connection::{self, End},
        Connection,
    },
};

use super::NonTx;

/// Transactional Postgres database client.
///
/// The transaction stays open from [`Tx::begin()`] till [`Tx::commit()`] or
/// [`Tx::rollback()`]. Dropping the last clone of the client without
/// committing it rolls the transaction back.
#[derive(Clone, Debug)]
pub struct Tx(Arc<Mutex<Option<connection::Tx>>>);

impl Tx {
    /// Opens a new [`Tx`] on a connection of the provided [`NonTx`] client.
    ///
    /// # Errors
    ///
    /// If no connection is available or the transaction failed to open.
    pub async fn begin(
        client: &NonTx,
    ) -> Result<Self, Traced<database::Error>> {
        let conn = client.connection().await.map_err(tracerr::wrap!())?;
        let tx = connection::Tx::begin(conn, client.lock_timeout)
            .await
            .map_err(tracerr::wrap!())?;
        Ok(Self(Arc::new(Mutex::new(Some(tx)))))
    }

    /// Returns the [`Connection`] of this [`Tx`] while it is open.
    async fn connection(
        &self,
    ) -> Result<MappedMutexGuard<'_, connection::Tx>, Traced<database::Error>>
    {
        MutexGuard::try_map(self.0.lock().await, Option::as_mut)
            .map_err(|_| postgres::Error::TxEnded)
            .map_err(tracerr::from_and_wrap!(=> database::Error))
    }

    /// Ends this [`Tx`] in the provided way, if it is still open.
    async fn end(&self, end: End) -> Result<(), Traced<database::Error>> {
        let Some(tx) = self.0.lock().await.take() else {
            return Ok(());
        };
        tx.end(end).await.map_err(tracerr::wrap!())
    }

    /// Commits this [`Tx`].
    ///
    /// # Errors
    ///
    /// If failed to commit the transaction of this [`Tx`].
    pub async fn commit(&self) -> Result<(), Traced<database::Error>> {
        self.end(End::Commit).await
    }

    /// Rolls back this [`Tx`].
    ///
    /// # Errors
    ///
    /// If failed to roll back the transaction of this [`Tx`].
    pub async fn rollback(&self) -> Result<(), Traced<database::Error>> {
        self.end(End::Rollback).await
    }
}

impl Connection for Tx {
    async fn query<T>(
        &self,
        stmt: &T,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<Row>, Traced<database::Error>>
    where
        T: ToStatement + ?Sized,
    {
        let conn = self.connection().await.map_err(tracerr::wrap!())?;
        conn.query(stmt, params).await.map_err(tracerr::wrap!())
    }

    async fn query_opt<T>(
        &self,
        stmt: &T,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Option<Row>, Traced<database::Error>>
    where
        T: ToStatement + ?Sized,
    {
        let conn = self.connection().await.map_err(tracerr::wrap!())?;
        conn.query_opt(stmt, params).await.map_err(tracerr::wrap!())
    }

    async fn exec<T>(
        &self,
        stmt: &T,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<u64, Traced<database::Error>>
    where
        T: ToStatement + ?Sized,
    {
        let conn = self.connection().await.map_err(tracerr::wrap!())?;
        conn.exec(stmt, params).await.map_err(tracerr::wrap!())
    }

    async fn batch_exec(
        &self,
        query: &str,
    ) -> Result<(), Traced<database::Error>> {
        let conn = self.connection().await.map_err(tracerr::wrap!())?;
        conn.batch_exec(query).await.map_err(tracerr::wrap!())
    }
}
