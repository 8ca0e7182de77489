//! # State Management
//!
//! Runtime directory I/O and saved validation reports.

pub mod io;
pub mod report;

pub use report::{list_reports, load_report, save_report};
