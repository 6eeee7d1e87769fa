//! [`Command`] for editing a catalog [`Product`].

use common::{
    operations::{By, Commit, Lock, Select, Transact, Transacted, Update},
    Money,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{product, Product},
    error::{Categorize, Category},
    infra::{database, Database},
    Service,
};

use super::{Command, Retryable};

/// [`Command`] for editing a catalog [`Product`].
///
/// Already recorded [`Sale`]s keep their snapshots of the [`Product`].
///
/// [`Sale`]: crate::domain::Sale
#[derive(Clone, Debug)]
pub struct UpdateProduct {
    /// ID of the [`Product`] to edit.
    pub product_id: product::Id,

    /// New [`product::Name`], if it should be changed.
    pub name: Option<product::Name>,

    /// New price, if it should be changed.
    pub price: Option<Money>,

    /// New stock, if it should be changed.
    ///
    /// Availability of the [`Product`] follows the new stock.
    pub quantity: Option<i32>,
}

impl<Db> Command<UpdateProduct> for Service<Db>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Lock<By<Product, product::Id>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Product>, product::Id>>,
            Ok = Option<Product>,
            Err = Traced<database::Error>,
        > + Database<Update<Product>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Product;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: UpdateProduct,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let UpdateProduct {
            product_id,
            name,
            price,
            quantity,
        } = cmd;

        if price.is_some_and(Money::is_zero) {
            return Err(tracerr::new!(E::ZeroPrice));
        }
        if let Some(p) = price.filter(|p| !p.fits(Product::PRICE_DIGITS)) {
            return Err(tracerr::new!(E::PriceTooLarge(p)));
        }
        let quantity = quantity
            .map(|q| product::Quantity::new(q).ok_or(E::NegativeQuantity(q)))
            .transpose()
            .map_err(tracerr::wrap!())?;

        let name = &name;
        self.retry(|| async move {
            let tx = self
                .database()
                .execute(Transact)
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?;

            tx.execute(Lock(By::<Product, _>::new(product_id)))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))
                .map(drop)?;

            let mut product = tx
                .execute(Select(By::<Option<Product>, _>::new(product_id)))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?
                .ok_or(E::ProductNotExists(product_id))
                .map_err(tracerr::wrap!())?;

            if let Some(name) = name {
                product.name = name.clone();
            }
            if let Some(price) = price {
                product.price = price;
            }
            if let Some(quantity) = quantity {
                product.set_quantity(quantity);
            }

            tx.execute(Update(product.clone()))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))
                .map(drop)?;
            tx.execute(Commit)
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))
                .map(drop)?;

            Ok::<_, Traced<E>>(product)
        })
        .await
    }
}

/// Error of [`UpdateProduct`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// New price is zero.
    #[display("Price must be positive")]
    ZeroPrice,

    /// New price exceeds [`Product::PRICE_DIGITS`].
    #[display("Price `{_0}` is too large")]
    PriceTooLarge(#[error(not(source))] Money),

    /// New stock is negative.
    #[display("Quantity must not be negative, but `{_0}` provided")]
    NegativeQuantity(#[error(not(source))] i32),

    /// [`Product`] with the provided ID does not exist.
    #[display("`Product(id: {_0})` does not exist")]
    ProductNotExists(#[error(not(source))] product::Id),

    /// Concurrent [`Command`]s prevented the [`Product`] from being updated.
    #[display("`Product` wasn't updated after {_0} attempts")]
    RetriesExhausted(#[error(not(source))] u32),
}

impl Categorize for ExecutionError {
    fn category(&self) -> Category {
        match self {
            Self::Db(_) => Category::Internal,
            Self::ZeroPrice
            | Self::PriceTooLarge(_)
            | Self::NegativeQuantity(_) => Category::Validation,
            Self::ProductNotExists(_) => Category::NotFound,
            Self::RetriesExhausted(_) => Category::Conflict,
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
        command::{fixture, Command as _, UpdateProduct},
        domain::product,
        error::{Categorize as _, Category},
    };

    use super::ExecutionError as E;

    fn restock(product_id: product::Id, quantity: i32) -> UpdateProduct {
        UpdateProduct {
            product_id,
            name: None,
            price: None,
            quantity: Some(quantity),
        }
    }

    #[tokio::test]
    async fn changes_only_provided_fields() {
        let svc = fixture::service();
        let coffee = fixture::product(&svc, "10.00", 5).await;

        let updated = svc
            .execute(UpdateProduct {
                product_id: coffee.id,
                name: None,
                price: Some(fixture::money("11.50")),
                quantity: None,
            })
            .await
            .unwrap();

        assert_eq!(updated.name, coffee.name);
        assert_eq!(updated.price, fixture::money("11.50"));
        assert_eq!(updated.quantity, coffee.quantity);
        let stored = fixture::reload(&svc, coffee.id).await;
        assert_eq!(stored.price, fixture::money("11.50"));
    }

    #[tokio::test]
    async fn follows_stock_with_availability() {
        let svc = fixture::service();
        let coffee = fixture::product(&svc, "10.00", 5).await;

        let emptied = svc.execute(restock(coffee.id, 0)).await.unwrap();
        assert!(!emptied.is_available);

        let refilled = svc.execute(restock(coffee.id, 7)).await.unwrap();
        assert!(refilled.is_available);
        assert_eq!(fixture::reload(&svc, coffee.id).await.quantity.get(), 7);
    }

    #[tokio::test]
    async fn rejects_price_beyond_stored_precision() {
        let svc = fixture::service();
        let coffee = fixture::product(&svc, "10.00", 5).await;

        let err = svc
            .execute(UpdateProduct {
                product_id: coffee.id,
                name: None,
                price: Some(fixture::money("12345678901.00")),
                quantity: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), E::PriceTooLarge(_)), "{err}");
        assert_eq!(err.category(), Category::Validation);
        let stored = fixture::reload(&svc, coffee.id).await;
        assert_eq!(stored.price, fixture::money("10.00"));
    }

    #[tokio::test]
    async fn rejects_negative_quantity() {
        let svc = fixture::service();
        let coffee = fixture::product(&svc, "10.00", 5).await;

        let err = svc.execute(restock(coffee.id, -3)).await.unwrap_err();

        assert!(matches!(err.as_ref(), E::NegativeQuantity(-3)), "{err}");
        assert_eq!(err.category(), Category::Validation);
        assert_eq!(fixture::reload(&svc, coffee.id).await.quantity.get(), 5);
    }

    #[tokio::test]
    async fn rejects_unknown_product() {
        let svc = fixture::service();

        let err = svc
            .execute(restock(product::Id::new(), 1))
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), E::ProductNotExists(_)), "{err}");
        assert_eq!(err.category(), Category::NotFound);
    }
}
