//! Shared types and utilities for Vitalscope
//!
//! This crate contains the health record model, period summaries, trend
//! comparisons, and time utilities used by the aggregator and the CLI.

pub mod types;
pub mod utils;

// Re-export commonly used types
pub use types::{record::*, summary::*, trend::*};
