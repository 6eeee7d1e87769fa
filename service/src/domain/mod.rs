//! Domain definitions.

pub mod operator;
pub mod product;
pub mod sale;
pub mod work_period;

pub use self::{
    operator::Operator, product::Product, sale::Sale, work_period::WorkPeriod,
};
