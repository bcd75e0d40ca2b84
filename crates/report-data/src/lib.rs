//! Data layer for the component report tool.
//!
//! Fetches component metadata and library analytics through a
//! [`reader::ComponentSource`], follows pagination cursors, resolves rows to
//! component groups and folds them into one ordered report table.

pub mod aggregator;
pub mod figma;
pub mod pagination;
pub mod presenter;
pub mod reader;
pub mod resolver;

pub use report_core as core;
