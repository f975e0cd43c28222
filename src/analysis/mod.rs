//! Analysis modules.
//!
//! Statistics over a finished harvest, used for the run summary and
//! the Markdown report.

pub mod aggregator;

pub use aggregator::*;
