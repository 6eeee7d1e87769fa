//! [`Handler`] abstractions.

use std::future::Future;

/// Executable handler.
///
/// Both the business operations of a service and the operations of its
/// storage are expressed as [`Handler`]s parametrized by their arguments, so
/// the set of supported operations is visible in the trait bounds.
pub trait Handler<Args = ()> {
    /// Type of successful [`Handler`] result.
    type Ok;

    /// Type of this [`Handler`] error.
    type Err;

    /// Executes this [`Handler`] with the provided arguments.
    fn execute(
        &self,
        args: Args,
    ) -> impl Future<Output = Result<Self::Ok, Self::Err>>;
}
