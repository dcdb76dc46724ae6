//! Job file schema and loading

pub mod job;
pub mod validator;

pub use job::{JobError, JobFile};
pub use validator::{JobValidator, ValidationError};
