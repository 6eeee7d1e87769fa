//! [`Command`] definition.

pub mod cancel_sale;
pub mod cancel_sale_items;
pub mod close_work_period;
pub mod create_operator;
pub mod create_product;
pub mod create_sale;
#[cfg(test)]
pub(crate) mod fixture;
pub mod start_work_period;
pub mod update_product;

use std::{fmt, future::Future};

use tokio::time;
use tracerr::Traced;
use tracing as log;

use crate::{RetryConfig, Service};

/// [`Command`] of the [`Service`].
///
/// [`Service`]: crate::Service
pub use common::Handler as Command;

pub use self::{
    cancel_sale::CancelSale, cancel_sale_items::CancelSaleItems,
    close_work_period::CloseWorkPeriod, create_operator::CreateOperator,
    create_product::CreateProduct, create_sale::CreateSale,
    start_work_period::StartWorkPeriod, update_product::UpdateProduct,
};

/// Error of a [`Command`] whose execution may succeed once retried.
trait Retryable {
    /// Indicates whether this error is caused by a concurrent [`Command`],
    /// so retrying may help.
    fn is_transient(&self) -> bool;

    /// Creates an error reporting that the provided number of attempts was
    /// made without success.
    fn retries_exhausted(attempts: u32) -> Self;
}

impl<Db> Service<Db> {
    /// Runs the provided `attempt` until it succeeds or fails with a
    /// non-transient error, at most [`RetryConfig::attempts`] times.
    async fn retry<T, E, F, Fut>(&self, mut attempt: F) -> Result<T, Traced<E>>
    where
        E: Retryable + fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Traced<E>>>,
    {
        let RetryConfig { attempts, backoff } = self.config().retry;
        let attempts = attempts.max(1);

        let mut n = 1;
        loop {
            match attempt().await {
                Err(e) if e.as_ref().is_transient() => {
                    if n >= attempts {
                        log::warn!("giving up after {n} attempts: {e}");
                        return Err(tracerr::new!(E::retries_exhausted(n)));
                    }
                    log::warn!("attempt {n}/{attempts} failed, retrying: {e}");
                    time::sleep(backoff * n).await;
                    n += 1;
                }
                res => return res,
            }
        }
    }
}
