//! QCR: Quality Check Report
//!
//! Fills outgoing inspection report templates with header data, the
//! sampling plan for the lot, defect records and classified photos.

pub mod cli;
pub mod core;
pub mod report;
pub mod schema;
pub mod sheet;
pub mod yaml;
