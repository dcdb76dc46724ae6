//! Project discovery
//!
//! A project is any directory holding a `.qcr/` folder. Its
//! `.qcr/config.yaml` is one of the configuration layers.

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::Config;

const PROJECT_DIR: &str = ".qcr";

#[derive(Debug)]
pub struct Project {
    /// Directory containing `.qcr/`
    root: PathBuf,
}

impl Project {
    /// Find project root by walking up from the current directory
    pub fn discover() -> Result<Self, ProjectError> {
        let current = std::env::current_dir().map_err(|e| ProjectError::IoError(e.to_string()))?;
        Self::discover_from(&current)
    }

    /// Find project root by walking up from the given directory
    pub fn discover_from(start: &Path) -> Result<Self, ProjectError> {
        let mut current = start
            .canonicalize()
            .map_err(|e| ProjectError::IoError(e.to_string()))?;

        loop {
            if current.join(PROJECT_DIR).is_dir() {
                return Ok(Self { root: current });
            }

            if !current.pop() {
                return Err(ProjectError::NotFound {
                    searched_from: start.to_path_buf(),
                });
            }
        }
    }

    /// Create `.qcr/config.yaml` holding the built-in configuration
    pub fn init(path: &Path, force: bool) -> Result<Self, ProjectError> {
        let root = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        let project = Self { root };

        let config_path = project.config_path();
        if config_path.exists() && !force {
            return Err(ProjectError::AlreadyExists(config_path));
        }

        std::fs::create_dir_all(project.qcr_dir())
            .map_err(|e| ProjectError::IoError(e.to_string()))?;
        let defaults = Config::default_yaml().map_err(|e| ProjectError::IoError(e.to_string()))?;
        std::fs::write(&config_path, defaults).map_err(|e| ProjectError::IoError(e.to_string()))?;

        Ok(project)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn qcr_dir(&self) -> PathBuf {
        self.root.join(PROJECT_DIR)
    }

    pub fn config_path(&self) -> PathBuf {
        self.qcr_dir().join("config.yaml")
    }
}

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("no .qcr directory found (searched from {searched_from:?}). Run 'qcr config init' to create one.")]
    NotFound { searched_from: PathBuf },

    #[error("config already exists at {0:?} (use --force to overwrite)")]
    AlreadyExists(PathBuf),

    #[error("IO error: {0}")]
    IoError(String),
}
