//! Runtime layer for the component report tool.
//!
//! Writes the CSV and Markdown files, mirrors reports into Notion and drives
//! the sequential batch over every requested file.

pub mod mirror;
pub mod orchestrator;
pub mod writer;

pub use report_core as core;
pub use report_data as data;
