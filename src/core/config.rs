//! Configuration management with layered hierarchy
//!
//! Layers, lowest priority first: the built-in `defaults/config.yaml`, the
//! global user config, the project `.qcr/config.yaml`, an explicit
//! `--config` file, then `QCR_*` environment variables. A key set in a layer
//! replaces the whole value from the layers below.

use miette::Diagnostic;
use rust_embed::Embed;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::core::Project;
use crate::report::basic_info::{DrawingRule, TemplateCellMap};
use crate::report::classify::StepKeywords;
use crate::report::defects::DefectBlock;
use crate::report::layout::{DefectGrid, Step5SubItem, StripGeometry};
use crate::report::sampling::{SamplingPlanError, SamplingPlanTable, SamplingRange, SamplingRows};
use crate::report::text::{Captions, TextError, TextTemplates};
use crate::sheet::{BorderSpec, FontSpec};
use crate::yaml::{self, YamlError};

#[derive(Embed)]
#[folder = "defaults/"]
struct EmbeddedDefaults;

const DEFAULT_CONFIG_FILE: &str = "config.yaml";

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("Built-in configuration is missing or not UTF-8")]
    #[diagnostic(code(qcr::config::builtin))]
    MissingDefaults,

    #[error(transparent)]
    #[diagnostic(transparent)]
    Yaml(#[from] YamlError),

    #[error("Invalid sampling plan in configuration: {0}")]
    #[diagnostic(
        code(qcr::config::sampling_plan),
        help("Bands must start at 151, follow each other without gaps and end with an open band")
    )]
    SamplingPlan(#[from] SamplingPlanError),

    #[error("Invalid text template in configuration: {0}")]
    #[diagnostic(code(qcr::config::template))]
    Text(#[from] TextError),
}

/// Sheet names in the template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetNames {
    pub main: String,
    /// Tera template rendered with `po_number`
    pub reference_pictures: String,
}

/// Effective configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Template used when none is given on the command line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<PathBuf>,

    /// Default inspector name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inspector: Option<String>,

    /// Default approver name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approver: Option<String>,

    /// Default customer name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer: Option<String>,

    /// chrono format for dates filled in automatically
    pub date_format: String,

    pub sheets: SheetNames,
    pub drawing_rules: Vec<DrawingRule>,
    pub defect_words: Vec<String>,
    pub defect_file_prefix: String,
    pub sku_options: Vec<String>,
    pub model_prefixes: Vec<String>,
    pub step_keywords: Vec<StepKeywords>,
    pub sampling_plan: Vec<SamplingRange>,

    #[serde(default)]
    pub sampling_rows: SamplingRows,

    #[serde(default)]
    pub cells: TemplateCellMap,

    #[serde(default)]
    pub defect_block: DefectBlock,

    pub captions: Captions,
    pub step_text: BTreeMap<String, String>,
    pub step5_sub_items: Vec<Step5SubItem>,
    pub font: FontSpec,
    pub border: BorderSpec,
    pub image: StripGeometry,
    pub defect_image: DefectGrid,
    pub highlight_font: FontSpec,
}

/// One configuration file; every key optional
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigLayer {
    pub template: Option<PathBuf>,
    pub inspector: Option<String>,
    pub approver: Option<String>,
    pub customer: Option<String>,
    pub date_format: Option<String>,
    pub sheets: Option<SheetNames>,
    pub drawing_rules: Option<Vec<DrawingRule>>,
    pub defect_words: Option<Vec<String>>,
    pub defect_file_prefix: Option<String>,
    pub sku_options: Option<Vec<String>>,
    pub model_prefixes: Option<Vec<String>>,
    pub step_keywords: Option<Vec<StepKeywords>>,
    pub sampling_plan: Option<Vec<SamplingRange>>,
    pub sampling_rows: Option<SamplingRows>,
    pub cells: Option<TemplateCellMap>,
    pub defect_block: Option<DefectBlock>,
    pub captions: Option<Captions>,
    pub step_text: Option<BTreeMap<String, String>>,
    pub step5_sub_items: Option<Vec<Step5SubItem>>,
    pub font: Option<FontSpec>,
    pub border: Option<BorderSpec>,
    pub image: Option<StripGeometry>,
    pub defect_image: Option<DefectGrid>,
    pub highlight_font: Option<FontSpec>,
}

impl ConfigLayer {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        Ok(yaml::parse_yaml_file(path)?)
    }
}

/// Where each configuration layer comes from
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    pub global: Option<PathBuf>,
    pub project: Option<PathBuf>,
    pub explicit: Option<PathBuf>,
}

impl ConfigSources {
    /// Standard locations relative to the current directory
    pub fn discover(explicit: Option<&Path>) -> Self {
        Self {
            global: Config::global_config_path(),
            project: Project::discover()
                .ok()
                .map(|p| p.config_path()),
            explicit: explicit.map(Path::to_path_buf),
        }
    }

    /// Files that exist, lowest priority first
    pub fn existing(&self) -> Vec<&Path> {
        let mut files: Vec<&Path> = [&self.global, &self.project]
            .into_iter()
            .flatten()
            .map(PathBuf::as_path)
            .filter(|p| p.is_file())
            .collect();
        // An explicit file must exist; reading it reports the error.
        if let Some(explicit) = &self.explicit {
            files.push(explicit);
        }
        files
    }
}

impl Config {
    /// Raw text of the built-in configuration
    pub fn default_yaml() -> Result<String, ConfigError> {
        let file = EmbeddedDefaults::get(DEFAULT_CONFIG_FILE).ok_or(ConfigError::MissingDefaults)?;
        String::from_utf8(file.data.into_owned()).map_err(|_| ConfigError::MissingDefaults)
    }

    /// The built-in configuration alone
    pub fn builtin() -> Result<Self, ConfigError> {
        let source = Self::default_yaml()?;
        Ok(yaml::parse_yaml_str(&source, "defaults/config.yaml")?)
    }

    /// Load configuration from all sources, merging in priority order
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_from(&ConfigSources::discover(explicit), |key| std::env::var(key).ok())
    }

    /// Load from the given sources with an injectable environment
    pub fn load_from(
        sources: &ConfigSources,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::builtin()?;

        for path in sources.existing() {
            debug!(path = %path.display(), "loading config layer");
            config.merge(ConfigLayer::from_file(path)?);
        }

        if let Some(template) = env("QCR_TEMPLATE") {
            config.template = Some(PathBuf::from(template));
        }
        if let Some(inspector) = env("QCR_INSPECTOR") {
            config.inspector = Some(inspector);
        }
        if let Some(approver) = env("QCR_APPROVER") {
            config.approver = Some(approver);
        }

        config.validate()?;
        Ok(config)
    }

    /// Get the path to the global config file
    pub fn global_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "qcr")
            .map(|dirs| dirs.config_dir().join(DEFAULT_CONFIG_FILE))
    }

    /// Merge a layer into this config (the layer takes precedence)
    pub fn merge(&mut self, layer: ConfigLayer) {
        macro_rules! replace {
            ($($field:ident),+ $(,)?) => {
                $(if let Some(value) = layer.$field {
                    self.$field = value;
                })+
            };
        }

        if layer.template.is_some() {
            self.template = layer.template;
        }
        if layer.inspector.is_some() {
            self.inspector = layer.inspector;
        }
        if layer.approver.is_some() {
            self.approver = layer.approver;
        }
        if layer.customer.is_some() {
            self.customer = layer.customer;
        }
        replace!(
            date_format,
            sheets,
            drawing_rules,
            defect_words,
            defect_file_prefix,
            sku_options,
            model_prefixes,
            step_keywords,
            sampling_plan,
            sampling_rows,
            cells,
            defect_block,
            captions,
            step_text,
            step5_sub_items,
            font,
            border,
            image,
            defect_image,
            highlight_font,
        );
    }

    /// Check the parts that are only usable after further processing
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.sampling_table()?;
        self.caption_templates()?;
        self.step_templates()?;
        TextTemplates::new([("reference_pictures", self.sheets.reference_pictures.as_str())])?;
        Ok(())
    }

    pub fn sampling_table(&self) -> Result<SamplingPlanTable, SamplingPlanError> {
        SamplingPlanTable::new(self.sampling_plan.clone())
    }

    pub fn caption_templates(&self) -> Result<TextTemplates, TextError> {
        TextTemplates::from_captions(&self.captions)
    }

    pub fn step_templates(&self) -> Result<TextTemplates, TextError> {
        TextTemplates::from_map(&self.step_text)
    }

    /// Output file prefix: first configured model found in the SKU
    pub fn model_prefix(&self, sku: Option<&str>) -> &str {
        sku.and_then(|sku| {
            self.model_prefixes
                .iter()
                .find(|m| sku.contains(m.as_str()))
        })
        .map(String::as_str)
        .unwrap_or("MODEL")
    }
}
