//! [`Command`] for closing an open [`WorkPeriod`].

use common::{
    operations::{By, Commit, Lock, Select, Transact, Transacted, Update},
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{operator, work_period, Operator, WorkPeriod},
    error::{Categorize, Category},
    infra::{database, Database},
    Service,
};

use super::{Command, Retryable};

/// [`Command`] for closing an open [`WorkPeriod`].
///
/// Counters of a closed [`WorkPeriod`] are frozen, and no more [`Sale`]s can
/// be made during it.
///
/// [`Sale`]: crate::domain::Sale
#[derive(Clone, Copy, Debug)]
pub struct CloseWorkPeriod {
    /// ID of the [`WorkPeriod`] to close.
    pub work_period_id: work_period::Id,

    /// ID of the [`Operator`] owning the [`WorkPeriod`].
    pub operator_id: operator::Id,
}

impl<Db> Command<CloseWorkPeriod> for Service<Db>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Lock<By<Operator, operator::Id>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<WorkPeriod>, work_period::Id>>,
            Ok = Option<WorkPeriod>,
            Err = Traced<database::Error>,
        > + Database<Update<WorkPeriod>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = WorkPeriod;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: CloseWorkPeriod,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CloseWorkPeriod {
            work_period_id,
            operator_id,
        } = cmd;

        self.retry(|| async move {
            let tx = self
                .database()
                .execute(Transact)
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?;

            // Sales of the `Operator` hold the same lock while accruing into
            // the `WorkPeriod`.
            tx.execute(Lock(By::<Operator, _>::new(operator_id)))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))
                .map(drop)?;

            let mut period = tx
                .execute(Select(By::<Option<WorkPeriod>, _>::new(
                    work_period_id,
                )))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?
                .filter(|p| p.operator_id == operator_id)
                .ok_or(E::WorkPeriodNotExists(work_period_id))
                .map_err(tracerr::wrap!())?;
            if !period.is_open() {
                return Err(tracerr::new!(E::AlreadyClosed(work_period_id)));
            }

            period.closed_at = Some(DateTime::now().coerce());
            tx.execute(Update(period.clone()))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))
                .map(drop)?;
            tx.execute(Commit)
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))
                .map(drop)?;

            Ok::<_, Traced<E>>(period)
        })
        .await
    }
}

/// Error of [`CloseWorkPeriod`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`WorkPeriod`] is closed already.
    #[display("`WorkPeriod(id: {_0})` is already closed")]
    AlreadyClosed(#[error(not(source))] work_period::Id),

    /// [`WorkPeriod`] with the provided ID does not exist or belongs to
    /// another [`Operator`].
    #[display("`WorkPeriod(id: {_0})` does not exist")]
    WorkPeriodNotExists(#[error(not(source))] work_period::Id),

    /// Concurrent [`Command`]s prevented the [`WorkPeriod`] from being closed.
    #[display("`WorkPeriod` wasn't closed after {_0} attempts")]
    RetriesExhausted(#[error(not(source))] u32),
}

impl Categorize for ExecutionError {
    fn category(&self) -> Category {
        match self {
            Self::Db(_) => Category::Internal,
            Self::WorkPeriodNotExists(_) => Category::NotFound,
            Self::AlreadyClosed(_) | Self::RetriesExhausted(_) => {
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
    use crate::{
        command::{
            fixture::{self, line, sale},
            CloseWorkPeriod, Command as _, StartWorkPeriod,
        },
        domain::work_period,
        error::{Categorize as _, Category},
    };

    use super::ExecutionError as E;

    #[tokio::test]
    async fn freezes_counters_of_closed_period() {
        let svc = fixture::service();
        let (operator, period) = fixture::on_shift(&svc).await;
        let coffee = fixture::product(&svc, "2.50", 10).await;

        _ = svc
            .execute(sale(&operator, vec![line(&coffee, 2, "5.00")], "5.00"))
            .await
            .unwrap();
        _ = svc
            .execute(sale(&operator, vec![line(&coffee, 1, "2.50")], "2.50"))
            .await
            .unwrap();

        let closed = svc
            .execute(CloseWorkPeriod {
                work_period_id: period.id,
                operator_id: operator.id,
            })
            .await
            .unwrap();

        assert_eq!(closed.status(), work_period::Status::Closed);
        assert_eq!(closed.sales_count, 2);
        assert_eq!(closed.sales_total, fixture::money("7.50"));

        let err = svc
            .execute(sale(&operator, vec![line(&coffee, 1, "2.50")], "2.50"))
            .await
            .unwrap_err();
        assert_eq!(err.category(), Category::Authorization);
        assert_eq!(fixture::reload(&svc, coffee.id).await.quantity.get(), 7);
    }

    #[tokio::test]
    async fn allows_new_period_after_closing() {
        let svc = fixture::service();
        let (operator, period) = fixture::on_shift(&svc).await;

        _ = svc
            .execute(CloseWorkPeriod {
                work_period_id: period.id,
                operator_id: operator.id,
            })
            .await
            .unwrap();
        let next = svc
            .execute(StartWorkPeriod {
                operator_id: operator.id,
            })
            .await
            .unwrap();

        assert_ne!(next.id, period.id);
        assert!(next.is_open());
    }

    #[tokio::test]
    async fn rejects_closing_twice() {
        let svc = fixture::service();
        let (operator, period) = fixture::on_shift(&svc).await;
        let cmd = CloseWorkPeriod {
            work_period_id: period.id,
            operator_id: operator.id,
        };
        _ = svc.execute(cmd).await.unwrap();

        let err = svc.execute(cmd).await.unwrap_err();

        assert!(matches!(err.as_ref(), E::AlreadyClosed(_)), "{err}");
        assert_eq!(err.category(), Category::Conflict);
    }

    #[tokio::test]
    async fn rejects_period_of_another_operator() {
        let svc = fixture::service();
        let (_, period) = fixture::on_shift(&svc).await;
        let stranger = fixture::operator(&svc).await;

        let err = svc
            .execute(CloseWorkPeriod {
                work_period_id: period.id,
                operator_id: stranger.id,
            })
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), E::WorkPeriodNotExists(_)), "{err}");
        assert_eq!(err.category(), Category::NotFound);
    }
}
