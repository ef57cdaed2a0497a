//! Core data types

pub mod record;
pub mod summary;
pub mod trend;
