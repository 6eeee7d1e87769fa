//! [`Query`] definition.

pub mod operator;
pub mod product;
pub mod sale;
pub mod sales;
pub mod work_period;

use common::operations::{By, Select};
use tracerr::Traced;

use crate::{
    infra::{database, Database},
    Service,
};

/// [`Query`] of the [`Service`].
pub use common::Handler as Query;

/// [`Query`] [`Select`]ing a `T`ype from a [`Database`].
#[derive(Clone, Copy, Debug)]
#[expect(clippy::module_name_repetitions, reason = "more readable")]
pub struct DatabaseQuery<T>(T);

impl<W, B> DatabaseQuery<By<W, B>> {
    /// Creates a new [`DatabaseQuery`] selecting a `W` by the provided `B`.
    #[must_use]
    pub fn by(by: B) -> Self {
        Self(By::new(by))
    }
}

impl<Db, W, B> Query<DatabaseQuery<By<W, B>>> for Service<Db>
where
    Db: Database<Select<By<W, B>>, Ok = W, Err = Traced<database::Error>>,
{
    type Ok = W;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        DatabaseQuery(by): DatabaseQuery<By<W, B>>,
    ) -> Result<Self::Ok, Self::Err> {
        self.database()
            .execute(Select(by))
            .await
            .map_err(tracerr::wrap!())
    }
}

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use common::DateTime;
    use tokio::time;

    use crate::{
        command::{
            fixture::{self, line, sale},
            Command as _,
        },
        domain::sale,
        query::{self, Query as _},
    };

    #[tokio::test]
    async fn selects_sales_within_inclusive_range() {
        let svc = fixture::service();
        let (operator, _) = fixture::on_shift(&svc).await;
        let coffee = fixture::product(&svc, "1.00", 10).await;

        let start: sale::CreationDateTime = DateTime::now().coerce();
        time::sleep(Duration::from_millis(2)).await;
        let mut made = Vec::new();
        for _ in 0..3 {
            let cmd = sale(&operator, vec![line(&coffee, 1, "1.00")], "1.00");
            made.push(svc.execute(cmd).await.unwrap());
        }
        let end = made.last().unwrap().created_at;

        let found = svc
            .execute(query::sales::ByDateRange::by(start..=end))
            .await
            .unwrap();
        let before = svc
            .execute(query::sales::ByDateRange::by(start..=start))
            .await
            .unwrap();

        assert_eq!(found.len(), 3);
        assert!(found.windows(2).all(|w| w[0].created_at <= w[1].created_at));
        assert!(made.iter().all(|m| found.iter().any(|f| f.id == m.id)));
        assert!(before.is_empty());
    }

    #[tokio::test]
    async fn selects_sale_by_id() {
        let svc = fixture::service();
        let (operator, _) = fixture::on_shift(&svc).await;
        let coffee = fixture::product(&svc, "1.00", 10).await;
        let made = svc
            .execute(sale(&operator, vec![line(&coffee, 2, "2.00")], "2.00"))
            .await
            .unwrap();

        let found = svc
            .execute(query::sale::ById::by(made.id))
            .await
            .unwrap()
            .unwrap();
        let missing = svc
            .execute(query::sale::ById::by(sale::Id::new()))
            .await
            .unwrap();

        assert_eq!(found.items.len(), 1);
        assert_eq!(found.total, fixture::money("2.00"));
        assert!(missing.is_none());
    }
}
