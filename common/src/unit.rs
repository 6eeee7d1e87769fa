//! Marker types.

/// Marker type describing an entity creation.
#[derive(Clone, Copy, Debug)]
pub struct Creation;

/// Marker type describing an entity cancellation.
#[derive(Clone, Copy, Debug)]
pub struct Cancellation;

/// Marker type describing the opening of a time-bounded entity.
#[derive(Clone, Copy, Debug)]
pub struct Opening;

/// Marker type describing the closing of a time-bounded entity.
#[derive(Clone, Copy, Debug)]
pub struct Closing;
