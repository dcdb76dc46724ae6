//! Caption and label rendering
//!
//! Every caption the report writes comes from configuration as a small Tera
//! template (`"计划出货日期：{{ ship_date }}"`). They are registered once into a
//! single [`Tera`] instance and rendered by name.

use std::collections::BTreeMap;
use std::error::Error as StdError;

use serde::{Deserialize, Serialize};
use tera::{Context, Tera};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TextError {
    #[error("Invalid caption template '{name}': {message}")]
    Parse { name: String, message: String },

    #[error("Caption template not found: {0}")]
    NotFound(String),

    #[error("Failed to render caption '{name}': {message}")]
    Render { name: String, message: String },
}

/// Caption templates written on the main sheet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Captions {
    pub report_no: String,
    pub po_reference: String,
    pub sku_bom: String,
    pub ship_date: String,
    pub drawing: String,
    pub drawing_note: String,
    pub inspector_signature: String,
    pub approver_signature: String,
}

impl Captions {
    fn entries(&self) -> [(&'static str, &str); 8] {
        [
            ("report_no", self.report_no.as_str()),
            ("po_reference", self.po_reference.as_str()),
            ("sku_bom", self.sku_bom.as_str()),
            ("ship_date", self.ship_date.as_str()),
            ("drawing", self.drawing.as_str()),
            ("drawing_note", self.drawing_note.as_str()),
            ("inspector_signature", self.inspector_signature.as_str()),
            ("approver_signature", self.approver_signature.as_str()),
        ]
    }
}

/// Named text templates
pub struct TextTemplates {
    tera: Tera,
}

impl TextTemplates {
    /// Register `(name, template)` pairs
    pub fn new<'a>(
        templates: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<Self, TextError> {
        let mut tera = Tera::default();
        for (name, source) in templates {
            tera.add_raw_template(name, source)
                .map_err(|e| TextError::Parse {
                    name: name.to_string(),
                    message: error_chain(&e),
                })?;
        }
        Ok(Self { tera })
    }

    pub fn from_captions(captions: &Captions) -> Result<Self, TextError> {
        Self::new(captions.entries())
    }

    /// Step and header labels of the reference sheet
    pub fn from_map(map: &BTreeMap<String, String>) -> Result<Self, TextError> {
        Self::new(map.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|n| n == name)
    }

    pub fn render(&self, name: &str, context: &Context) -> Result<String, TextError> {
        if !self.contains(name) {
            return Err(TextError::NotFound(name.to_string()));
        }
        self.tera
            .render(name, context)
            .map_err(|e| TextError::Render {
                name: name.to_string(),
                message: error_chain(&e),
            })
    }
}

/// Render a single template string
pub fn render_str(source: &str, context: &Context) -> Result<String, TextError> {
    let templates = TextTemplates::new([("inline", source)])?;
    templates.render("inline", context)
}

// Tera keeps the useful part of its message in the source chain.
fn error_chain(err: &tera::Error) -> String {
    let mut message = err.to_string();
    let mut source = StdError::source(err);
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = StdError::source(inner);
    }
    message
}
