//! UI Module - terminal output for release runs
//!
//! - [`reporter`] - pipeline progress as `tracing` events
//! - [`table`] - end-of-run summary table
//! - [`progress`] - size and progress formatting

pub mod progress;
pub mod reporter;
pub mod table;

pub use reporter::TracingReporter;
