//! Command implementations

pub mod completions;
pub mod config;
pub mod generate;
pub mod report_no;
pub mod sampling;
pub mod scan;
