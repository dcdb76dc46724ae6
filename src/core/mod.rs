//! Core module - configuration and project discovery

pub mod config;
pub mod project;

pub use config::{Config, ConfigError, ConfigLayer, ConfigSources, SheetNames};
pub use project::{Project, ProjectError};
