//! Shared domain layer for the component report tool.
//!
//! Holds the raw and aggregated component models, the error type, CLI
//! settings, reporting-period parsing and the small formatting helpers used
//! by the data and runtime crates.

pub mod data_processors;
pub mod error;
pub mod formatting;
pub mod models;
pub mod period;
pub mod settings;
pub mod time_utils;

pub use error::{ReportError, Result};
