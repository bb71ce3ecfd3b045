//! Foundation layer: geometric types and math helpers.

pub mod math;
pub mod types;
