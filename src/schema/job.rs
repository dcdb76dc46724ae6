//! Job files: everything one report needs, in YAML
//!
//! ```yaml
//! template: 模板.xlsx
//! images: ./photos
//! basic:
//!   po_number: PO-1
//!   sku: P61718/M50XTCCSEN
//!   ship_quantity: 1800
//! defects:
//!   - { description: 划痕, major: 1 }
//! overrides:
//!   - { file: IMG_0042.jpg, step: Step 3 }
//! ```

use miette::Diagnostic;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::report::basic_info::BasicInfo;
use crate::report::classify::ImageOverride;
use crate::report::defects::DefectRecord;
use crate::schema::validator::{JobValidator, SchemaLoadError, ValidationError};
use crate::yaml::{self, YamlError};

#[derive(Debug, Error, Diagnostic)]
pub enum JobError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Schema(#[from] SchemaLoadError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Invalid(#[from] ValidationError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Yaml(#[from] YamlError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JobFile {
    pub template: Option<PathBuf>,
    pub images: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub basic: BasicInfo,
    pub defects: Vec<DefectRecord>,
    pub overrides: Vec<ImageOverride>,
}

impl JobFile {
    /// Read, validate and parse a job file. Relative paths are resolved
    /// against the directory holding it.
    pub fn load(path: &Path) -> Result<Self, JobError> {
        let source = yaml::read_source(path)?;
        let filename = path.display().to_string();

        JobValidator::new()?.validate(&source, &filename)?;

        let mut job: JobFile = if source.trim().is_empty() {
            JobFile::default()
        } else {
            yaml::parse_yaml_str(&source, &filename)?
        };

        if let Some(base) = path.parent() {
            job.resolve_relative_to(base);
        }
        debug!(
            path = %path.display(),
            defects = job.defects.len(),
            overrides = job.overrides.len(),
            "loaded job file"
        );
        Ok(job)
    }

    fn resolve_relative_to(&mut self, base: &Path) {
        for path in [&mut self.template, &mut self.images, &mut self.output]
            .into_iter()
            .flatten()
        {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }
}
