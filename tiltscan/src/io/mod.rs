//! Infrastructure layer: binary log access and export formats.

pub mod export;
pub mod log;
