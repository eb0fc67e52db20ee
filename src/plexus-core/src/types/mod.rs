//! Scalar values carried by plan literals.

mod value;

pub use value::Value;
