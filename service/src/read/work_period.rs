//! [`WorkPeriod`] read model definitions.

#[cfg(doc)]
use crate::domain::WorkPeriod;

/// Wrapper around [`WorkPeriod`] indicating that it [`is_open()`].
///
/// [`is_open()`]: WorkPeriod::is_open
#[derive(Clone, Debug)]
pub struct Open<T>(pub T);
