//! Read entities definitions.

pub mod work_period;
