//! [`Command`] for creating a new [`Operator`].

use common::{
    operations::{Commit, Insert, Transact, Transacted},
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{operator, Operator},
    error::{Categorize, Category},
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for creating a new [`Operator`].
#[derive(Clone, Debug)]
pub struct CreateOperator {
    /// [`operator::Name`] of a new [`Operator`].
    pub name: operator::Name,
}

impl<Db> Command<CreateOperator> for Service<Db>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<Insert<Operator>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Operator;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: CreateOperator,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CreateOperator { name } = cmd;

        let operator = Operator {
            id: operator::Id::new(),
            name,
            created_at: DateTime::now().coerce(),
        };

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        tx.execute(Insert(operator.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        Ok(operator)
    }
}

/// Error of [`CreateOperator`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),
}

impl Categorize for ExecutionError {
    fn category(&self) -> Category {
        match self {
            Self::Db(_) => Category::Internal,
        }
    }
}

#[cfg(test)]
mod spec {
    use common::operations::{By, Select};

    use crate::{
        command::{fixture, Command as _, CreateOperator},
        domain::{operator, Operator},
        infra::Database as _,
    };

    #[tokio::test]
    async fn persists_operator() {
        let svc = fixture::service();

        let created = svc
            .execute(CreateOperator {
                name: operator::Name::new("Bob").unwrap(),
            })
            .await
            .unwrap();

        let stored = svc
            .database()
            .execute(Select(By::<Option<Operator>, _>::new(created.id)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.name, created.name);
        assert_eq!(stored.created_at, created.created_at);
    }
}
