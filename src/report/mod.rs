//! Report building blocks and the generation pipeline

pub mod assembler;
pub mod basic_info;
pub mod classify;
pub mod defects;
pub mod layout;
pub mod sampling;
pub mod step;
pub mod text;

pub use assembler::{
    report_number, GenerateError, GenerationSummary, ReportAssembler, ReportJob, Stage,
    StageOutcome, StageReport,
};
pub use step::Step;
