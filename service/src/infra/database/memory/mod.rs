//! In-memory [`Database`] implementation.
//!
//! Mirrors the transactional semantics of the Postgres one:
//! - rows are locked with per-row mutexes held until the end of a
//!   transaction, and waiting for a lock is bounded by a timeout;
//! - writes of a transaction are staged aside and become visible to others
//!   only once committed, all at once;
//! - dropping a transaction without committing it discards its writes.

mod impls;

use std::{
    collections::HashMap, future::Future, hash::Hash, mem, sync::Arc,
    time::Duration,
};

use common::operations::{Commit, Rollback, Transact};
use derive_more::{Deref, Display, Error as StdError};
use tokio::{
    sync::{Mutex, OwnedMutexGuard, RwLock},
    time,
};
use tracerr::Traced;

use crate::{
    domain::{
        operator, product, sale, work_period, Operator, Product, Sale,
        WorkPeriod,
    },
    infra::{database, Database},
};

/// In-memory [`Database`] client.
#[derive(Clone, Debug, Deref)]
pub struct Memory<T = NonTx>(T);

impl Memory {
    /// Default time to wait for a row lock before giving up.
    pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

    /// Creates a new empty [`Memory`] database waiting for row locks no
    /// longer than the provided `lock_timeout`.
    #[must_use]
    pub fn new(lock_timeout: Duration) -> Self {
        Self(NonTx {
            storage: Arc::new(Storage {
                tables: RwLock::default(),
                locks: Mutex::default(),
                lock_timeout,
            }),
        })
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LOCK_TIMEOUT)
    }
}

/// Shared state of a [`Memory`] database.
#[derive(Debug)]
struct Storage {
    /// Committed rows.
    tables: RwLock<Tables>,

    /// Row locks, created on demand and forgotten once nobody holds or waits
    /// for them.
    locks: Mutex<HashMap<LockKey, Arc<Mutex<()>>>>,

    /// Time to wait for a row lock before giving up.
    lock_timeout: Duration,
}

/// Set of rows stored in a [`Memory`] database.
#[derive(Clone, Debug, Default)]
pub struct Tables {
    /// [`Operator`]s by their IDs.
    operators: HashMap<operator::Id, Operator>,

    /// [`Product`]s by their IDs.
    products: HashMap<product::Id, Product>,

    /// [`Sale`]s (along with their items) by their IDs.
    sales: HashMap<sale::Id, Sale>,

    /// [`WorkPeriod`]s by their IDs.
    work_periods: HashMap<work_period::Id, WorkPeriod>,
}

impl Tables {
    /// Overwrites rows of these [`Tables`] with the `other` ones.
    fn merge(&mut self, other: Self) {
        let Self {
            operators,
            products,
            sales,
            work_periods,
        } = other;
        self.operators.extend(operators);
        self.products.extend(products);
        self.sales.extend(sales);
        self.work_periods.extend(work_periods);
    }
}

/// Read-only view over the committed [`Tables`], overlaid with the staged
/// ones of a transaction, if any.
#[derive(Clone, Copy, Debug)]
pub struct View<'a> {
    /// Committed [`Tables`].
    committed: &'a Tables,

    /// [`Tables`] staged by the current transaction.
    staged: Option<&'a Tables>,
}

impl<'a> View<'a> {
    /// Returns the [`Operator`] with the provided ID, if any.
    fn operator(&self, id: operator::Id) -> Option<&'a Operator> {
        lookup(
            self.staged.map(|t| &t.operators),
            &self.committed.operators,
            &id,
        )
    }

    /// Returns the [`Product`] with the provided ID, if any.
    fn product(&self, id: product::Id) -> Option<&'a Product> {
        lookup(
            self.staged.map(|t| &t.products),
            &self.committed.products,
            &id,
        )
    }

    /// Returns the [`Sale`] with the provided ID, if any.
    fn sale(&self, id: sale::Id) -> Option<&'a Sale> {
        lookup(self.staged.map(|t| &t.sales), &self.committed.sales, &id)
    }

    /// Returns the [`WorkPeriod`] with the provided ID, if any.
    fn work_period(&self, id: work_period::Id) -> Option<&'a WorkPeriod> {
        lookup(
            self.staged.map(|t| &t.work_periods),
            &self.committed.work_periods,
            &id,
        )
    }

    /// Iterates over all the visible [`Sale`]s.
    fn sales(&self) -> impl Iterator<Item = &'a Sale> {
        scan(self.staged.map(|t| &t.sales), &self.committed.sales)
    }

    /// Iterates over all the visible [`WorkPeriod`]s.
    fn work_periods(&self) -> impl Iterator<Item = &'a WorkPeriod> {
        scan(
            self.staged.map(|t| &t.work_periods),
            &self.committed.work_periods,
        )
    }
}

/// Looks up the `key` in the `staged` rows first, falling back to the
/// `committed` ones.
fn lookup<'a, K: Eq + Hash, V>(
    staged: Option<&'a HashMap<K, V>>,
    committed: &'a HashMap<K, V>,
    key: &K,
) -> Option<&'a V> {
    staged
        .and_then(|s| s.get(key))
        .or_else(|| committed.get(key))
}

/// Iterates over the `staged` rows and the `committed` ones not shadowed by
/// them.
fn scan<'a, K: Eq + Hash, V>(
    staged: Option<&'a HashMap<K, V>>,
    committed: &'a HashMap<K, V>,
) -> impl Iterator<Item = &'a V> {
    staged.into_iter().flat_map(HashMap::values).chain(
        committed
            .iter()
            .filter(move |(k, _)| staged.map_or(true, |s| !s.contains_key(*k)))
            .map(|(_, v)| v),
    )
}

/// Key of a row lock.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
pub enum LockKey {
    /// [`Operator`] row.
    #[display("Operator({_0})")]
    Operator(operator::Id),

    /// [`Product`] row.
    #[display("Product({_0})")]
    Product(product::Id),

    /// [`Sale`] row.
    #[display("Sale({_0})")]
    Sale(sale::Id),
}

/// Generic [`Memory`] database connection.
pub trait Connection {
    /// Runs the provided read-only function over the visible rows.
    fn read<R>(
        &self,
        f: impl FnOnce(&View<'_>) -> R,
    ) -> impl Future<Output = R>;

    /// Runs the provided function over the visible rows and writes the rows
    /// it returns, atomically.
    fn apply<R>(
        &self,
        f: impl FnOnce(&View<'_>) -> (R, Tables),
    ) -> impl Future<Output = R>;

    /// Locks the row with the provided [`LockKey`] until the end of the
    /// current transaction.
    ///
    /// # Errors
    ///
    /// If the lock cannot be acquired in time.
    fn lock(
        &self,
        key: LockKey,
    ) -> impl Future<Output = Result<(), Traced<database::Error>>>;
}

/// Non-transactional [`Memory`] database client.
///
/// Every write is committed immediately.
#[derive(Clone, Debug)]
pub struct NonTx {
    /// [`Storage`] of the database.
    storage: Arc<Storage>,
}

impl Connection for NonTx {
    async fn read<R>(&self, f: impl FnOnce(&View<'_>) -> R) -> R {
        let tables = self.storage.tables.read().await;
        f(&View {
            committed: &tables,
            staged: None,
        })
    }

    async fn apply<R>(&self, f: impl FnOnce(&View<'_>) -> (R, Tables)) -> R {
        let mut tables = self.storage.tables.write().await;
        let (out, changes) = f(&View {
            committed: &tables,
            staged: None,
        });
        tables.merge(changes);
        out
    }

    async fn lock(&self, _: LockKey) -> Result<(), Traced<database::Error>> {
        // Nothing to hold the lock for outside a transaction.
        Ok(())
    }
}

/// Transactional [`Memory`] database client.
#[derive(Clone, Debug)]
pub struct Tx {
    /// [`Storage`] of the database.
    storage: Arc<Storage>,

    /// State of this transaction.
    state: Arc<Mutex<TxState>>,
}

/// State of a [`Tx`].
#[derive(Debug, Default)]
struct TxState {
    /// Rows written by the transaction, not visible to others yet.
    staged: Tables,

    /// Row locks held by the transaction.
    guards: HashMap<LockKey, OwnedMutexGuard<()>>,
}

impl Tx {
    /// Starts a new [`Tx`] over the provided [`NonTx`] client.
    fn from_non_tx(client: &NonTx) -> Self {
        Self {
            storage: Arc::clone(&client.storage),
            state: Arc::default(),
        }
    }

    /// Publishes the staged rows of this [`Tx`] and releases its locks.
    pub async fn commit(&self) {
        let mut state = self.state.lock().await;
        let staged = mem::take(&mut state.staged);
        self.storage.tables.write().await.merge(staged);
        state.guards.clear();
    }

    /// Discards the staged rows of this [`Tx`] and releases its locks.
    pub async fn rollback(&self) {
        let mut state = self.state.lock().await;
        state.staged = Tables::default();
        state.guards.clear();
    }
}

impl Connection for Tx {
    async fn read<R>(&self, f: impl FnOnce(&View<'_>) -> R) -> R {
        let state = self.state.lock().await;
        let tables = self.storage.tables.read().await;
        f(&View {
            committed: &tables,
            staged: Some(&state.staged),
        })
    }

    async fn apply<R>(&self, f: impl FnOnce(&View<'_>) -> (R, Tables)) -> R {
        let mut state = self.state.lock().await;
        let tables = self.storage.tables.read().await;
        let (out, changes) = f(&View {
            committed: &tables,
            staged: Some(&state.staged),
        });
        state.staged.merge(changes);
        out
    }

    async fn lock(&self, key: LockKey) -> Result<(), Traced<database::Error>> {
        let mut state = self.state.lock().await;
        if state.guards.contains_key(&key) {
            return Ok(());
        }

        let mutex = {
            let mut locks = self.storage.locks.lock().await;
            locks.retain(|_, m| Arc::strong_count(m) > 1);
            Arc::clone(locks.entry(key).or_default())
        };
        let guard = time::timeout(self.storage.lock_timeout, mutex.lock_owned())
            .await
            .map_err(|_| {
                tracerr::new!(database::Error::from(Error::LockTimeout(key)))
            })?;
        _ = state.guards.insert(key, guard);

        Ok(())
    }
}

impl Database<Transact> for Memory<NonTx> {
    type Ok = Memory<Tx>;
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Transact) -> Result<Self::Ok, Self::Err> {
        Ok(Memory(Tx::from_non_tx(&self.0)))
    }
}

impl Database<Transact> for Memory<Tx> {
    type Ok = Self;
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Transact) -> Result<Self::Ok, Self::Err> {
        Ok(self.clone())
    }
}

impl Database<Commit> for Memory<Tx> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Commit) -> Result<Self::Ok, Self::Err> {
        self.commit().await;
        Ok(())
    }
}

impl Database<Rollback> for Memory<Tx> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Rollback) -> Result<Self::Ok, Self::Err> {
        self.rollback().await;
        Ok(())
    }
}

/// [`Memory`] database [`Error`].
///
/// [`Error`]: enum@Error
#[derive(Clone, Copy, Debug, Display, StdError)]
pub enum Error {
    /// Row lock wasn't acquired in time.
    #[display("Timed out waiting for `{_0}` lock")]
    LockTimeout(#[error(not(source))] LockKey),

    /// Stock of a [`Product`] would overflow.
    #[display("`Product(id: {_0})` quantity overflow")]
    QuantityOverflow(#[error(not(source))] product::Id),
}

impl Error {
    /// Indicates whether retrying the transaction may help.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::LockTimeout(_) => true,
            Self::QuantityOverflow(_) => false,
        }
    }
}

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use common::operations::{Commit, Transact};

    use crate::{domain::product, infra::Database as _};

    use super::{Connection as _, LockKey, Memory};

    #[tokio::test]
    async fn forgets_released_row_locks() {
        let db = Memory::default();
        let held = db.execute(Transact).await.unwrap();
        held.lock(LockKey::Product(product::Id::new())).await.unwrap();

        for _ in 0..3 {
            let tx = db.execute(Transact).await.unwrap();
            tx.lock(LockKey::Product(product::Id::new())).await.unwrap();
            tx.execute(Commit).await.unwrap();
        }
        let tx = db.execute(Transact).await.unwrap();
        tx.lock(LockKey::Product(product::Id::new())).await.unwrap();

        assert_eq!(db.0.storage.locks.lock().await.len(), 2);
    }

    #[tokio::test]
    async fn times_out_on_held_row_lock() {
        let db = Memory::new(Duration::from_millis(10));
        let key = LockKey::Product(product::Id::new());
        let held = db.execute(Transact).await.unwrap();
        held.lock(key).await.unwrap();

        let tx = db.execute(Transact).await.unwrap();
        let err = tx.lock(key).await.unwrap_err();
        assert!(err.as_ref().is_transient(), "{err}");

        held.execute(Commit).await.unwrap();
        tx.lock(key).await.unwrap();
    }
}
