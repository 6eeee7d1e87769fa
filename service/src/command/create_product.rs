//! [`Command`] for adding a new [`Product`] to the catalog.

use common::{
    operations::{Commit, Insert, Transact, Transacted},
    DateTime, Money,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{product, Product},
    error::{Categorize, Category},
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for adding a new [`Product`] to the catalog.
///
/// The [`Product`] is available for sale as long as its initial stock is not
/// empty.
#[derive(Clone, Debug)]
pub struct CreateProduct {
    /// [`product::Name`] of a new [`Product`].
    pub name: product::Name,

    /// Price of a single unit of a new [`Product`].
    pub price: Money,

    /// Initial stock of a new [`Product`].
    pub quantity: i32,
}

impl<Db> Command<CreateProduct> for Service<Db>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<Insert<Product>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Product;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: CreateProduct,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CreateProduct {
            name,
            price,
            quantity,
        } = cmd;

        if price.is_zero() {
            return Err(tracerr::new!(E::ZeroPrice));
        }
        if !price.fits(Product::PRICE_DIGITS) {
            return Err(tracerr::new!(E::PriceTooLarge(price)));
        }
        let quantity = product::Quantity::new(quantity)
            .ok_or(E::NegativeQuantity(quantity))
            .map_err(tracerr::wrap!())?;

        let mut product = Product {
            id: product::Id::new(),
            name,
            price,
            quantity,
            is_available: false,
            created_at: DateTime::now().coerce(),
        };
        product.set_quantity(quantity);

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        tx.execute(Insert(product.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        Ok(product)
    }
}

/// Error of [`CreateProduct`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// Price is zero.
    #[display("Price must be positive")]
    ZeroPrice,

    /// Price exceeds [`Product::PRICE_DIGITS`].
    #[display("Price `{_0}` is too large")]
    PriceTooLarge(#[error(not(source))] Money),

    /// Stock is negative.
    #[display("Quantity must not be negative, but `{_0}` provided")]
    NegativeQuantity(#[error(not(source))] i32),
}

impl Categorize for ExecutionError {
    fn category(&self) -> Category {
        match self {
            Self::Db(_) => Category::Internal,
            Self::ZeroPrice
            | Self::PriceTooLarge(_)
            | Self::NegativeQuantity(_) => Category::Validation,
        }
    }
}

#[cfg(test)]
mod spec {
    use crate::{
        command::{fixture, Command as _, CreateProduct},
        domain::product,
        error::{Categorize as _, Category},
    };

    use super::ExecutionError as E;

    fn cmd(price: &str, quantity: i32) -> CreateProduct {
        CreateProduct {
            name: product::Name::new("Green tea").unwrap(),
            price: fixture::money(price),
            quantity,
        }
    }

    #[tokio::test]
    async fn derives_availability_from_stock() {
        let svc = fixture::service();

        let stocked = svc.execute(cmd("2.50", 3)).await.unwrap();
        let empty = svc.execute(cmd("2.50", 0)).await.unwrap();

        assert!(stocked.is_available);
        assert!(!empty.is_available);
        assert_eq!(fixture::reload(&svc, stocked.id).await.quantity.get(), 3);
    }

    #[tokio::test]
    async fn rejects_zero_price() {
        let svc = fixture::service();

        let err = svc.execute(cmd("0.00", 1)).await.unwrap_err();

        assert!(matches!(err.as_ref(), E::ZeroPrice), "{err}");
        assert_eq!(err.category(), Category::Validation);
    }

    #[tokio::test]
    async fn rejects_price_beyond_stored_precision() {
        let svc = fixture::service();

        let err = svc.execute(cmd("10000000000.00", 1)).await.unwrap_err();

        assert!(matches!(err.as_ref(), E::PriceTooLarge(_)), "{err}");
        assert_eq!(err.category(), Category::Validation);
        assert!(svc.execute(cmd("9999999999.99", 1)).await.is_ok());
    }

    #[tokio::test]
    async fn rejects_negative_quantity() {
        let svc = fixture::service();

        let err = svc.execute(cmd("1.00", -1)).await.unwrap_err();

        assert!(matches!(err.as_ref(), E::NegativeQuantity(-1)), "{err}");
        assert_eq!(err.category(), Category::Validation);
    }
}
