//! [`Command`] for opening a new [`WorkPeriod`] of an [`Operator`].

use common::operations::{
    By, Commit, Insert, Lock, Select, Transact, Transacted,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{operator, work_period, Operator, WorkPeriod},
    error::{Categorize, Category},
    infra::{database, Database},
    read::work_period::Open,
    Service,
};

use super::{Command, Retryable};

/// Name of the constraint allowing a single open [`WorkPeriod`] per
/// [`Operator`].
const OPEN_CONSTRAINT: &str = "work_periods_open_operator_id_key";

/// [`Command`] for opening a new [`WorkPeriod`] of an [`Operator`].
#[derive(Clone, Copy, Debug)]
pub struct StartWorkPeriod {
    /// ID of the [`Operator`] starting the [`WorkPeriod`].
    pub operator_id: operator::Id,
}

impl<Db> Command<StartWorkPeriod> for Service<Db>
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
        > + Database<Insert<WorkPeriod>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = WorkPeriod;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: StartWorkPeriod,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let StartWorkPeriod { operator_id } = cmd;

        self.database()
            .execute(Select(By::<Option<Operator>, _>::new(operator_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::OperatorNotExists(operator_id))
            .map_err(tracerr::wrap!())?;

        self.retry(|| async move {
            let tx = self
                .database()
                .execute(Transact)
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?;

            tx.execute(Lock(By::<Operator, _>::new(operator_id)))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))
                .map(drop)?;

            let open = tx
                .execute(Select(By::<Option<Open<WorkPeriod>>, _>::new(
                    operator_id,
                )))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?;
            if let Some(Open(period)) = open {
                return Err(tracerr::new!(E::AlreadyOpen(period.id)));
            }

            let period = WorkPeriod::open(operator_id);
            let inserted = tx.execute(Insert(period.clone())).await;
            if let Err(e) = &inserted {
                if e.as_ref().is_unique_violation(Some(OPEN_CONSTRAINT)) {
                    return Err(tracerr::new!(E::AlreadyOpenConcurrently));
                }
            }
            inserted
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

/// Error of [`StartWorkPeriod`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Operator`] has an open [`WorkPeriod`] already.
    #[display("`WorkPeriod(id: {_0})` is still open")]
    AlreadyOpen(#[error(not(source))] work_period::Id),

    /// Another [`WorkPeriod`] of the [`Operator`] was opened concurrently.
    #[display("Another `WorkPeriod` has been opened concurrently")]
    AlreadyOpenConcurrently,

    /// [`Operator`] with the provided ID does not exist.
    #[display("`Operator(id: {_0})` does not exist")]
    OperatorNotExists(#[error(not(source))] operator::Id),

    /// Concurrent [`Command`]s prevented the [`WorkPeriod`] from being opened.
    #[display("`WorkPeriod` wasn't opened after {_0} attempts")]
    RetriesExhausted(#[error(not(source))] u32),
}

impl Categorize for ExecutionError {
    fn category(&self) -> Category {
        match self {
            Self::Db(_) => Category::Internal,
            Self::OperatorNotExists(_) => Category::NotFound,
            Self::AlreadyOpen(_)
            | Self::AlreadyOpenConcurrently
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
        command::{fixture, Command as _, StartWorkPeriod},
        domain::{operator, work_period},
        error::{Categorize as _, Category},
    };

    use super::ExecutionError as E;

    #[tokio::test]
    async fn opens_period_with_zeroed_counters() {
        let svc = fixture::service();
        let operator = fixture::operator(&svc).await;

        let period = svc
            .execute(StartWorkPeriod {
                operator_id: operator.id,
            })
            .await
            .unwrap();

        assert_eq!(period.operator_id, operator.id);
        assert_eq!(period.status(), work_period::Status::Open);
        assert_eq!(period.sales_count, 0);
        assert!(period.sales_total.is_zero());
    }

    #[tokio::test]
    async fn rejects_second_open_period() {
        let svc = fixture::service();
        let (operator, first) = fixture::on_shift(&svc).await;

        let err = svc
            .execute(StartWorkPeriod {
                operator_id: operator.id,
            })
            .await
            .unwrap_err();

        assert!(
            matches!(err.as_ref(), E::AlreadyOpen(id) if *id == first.id),
            "{err}",
        );
        assert_eq!(err.category(), Category::Conflict);
    }

    #[tokio::test]
    async fn opens_periods_of_different_operators() {
        let svc = fixture::service();
        let (_, first) = fixture::on_shift(&svc).await;
        let (_, second) = fixture::on_shift(&svc).await;

        assert_ne!(first.id, second.id);
        assert!(first.is_open() && second.is_open());
    }

    #[tokio::test]
    async fn rejects_unknown_operator() {
        let svc = fixture::service();

        let err = svc
            .execute(StartWorkPeriod {
                operator_id: operator::Id::new(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), E::OperatorNotExists(_)), "{err}");
        assert_eq!(err.category(), Category::NotFound);
    }
}
