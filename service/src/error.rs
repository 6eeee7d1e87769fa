//! Classification of [`Command`] and [`Query`] errors.

use derive_more::Display;
use tracerr::Traced;

#[cfg(doc)]
use crate::{Command, Query};

/// Category of a [`Command`] or [`Query`] error, describing what the caller
/// should do about it.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
pub enum Category {
    /// Input is malformed or inconsistent, and must be fixed before retrying.
    #[display("Validation")]
    Validation,

    /// Referenced entity doesn't exist.
    #[display("NotFound")]
    NotFound,

    /// Current state forbids the operation, like insufficient stock or an
    /// already cancelled sale.
    #[display("Conflict")]
    Conflict,

    /// Actor is not allowed to perform the operation in its current state.
    #[display("Authorization")]
    Authorization,

    /// Infrastructure failure not caused by the caller.
    #[display("Internal")]
    Internal,
}

/// Error that can be classified into a [`Category`].
pub trait Categorize {
    /// Returns the [`Category`] of this error.
    fn category(&self) -> Category;
}

impl<E: Categorize> Categorize for Traced<E> {
    fn category(&self) -> Category {
        self.as_ref().category()
    }
}
