//! Job file validation with source-located errors

use jsonschema::error::ValidationErrorKind;
use jsonschema::{validator_for, ValidationError as JsonSchemaError, Validator as JsonValidator};
use miette::{Diagnostic, NamedSource, SourceSpan};
use rust_embed::Embed;
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::yaml::diagnostics::line_col_to_offset;

#[derive(Embed)]
#[folder = "schemas/"]
struct EmbeddedSchemas;

const JOB_SCHEMA: &str = "job.schema.json";

/// The embedded schema could not be loaded
#[derive(Debug, Error, Diagnostic)]
#[error("Built-in schema '{name}' is unusable: {message}")]
#[diagnostic(code(qcr::schema::builtin))]
pub struct SchemaLoadError {
    name: String,
    message: String,
}

/// Validation error with source location information
#[derive(Debug, Error, Diagnostic)]
#[error("Job file is invalid: {summary}")]
#[diagnostic(code(qcr::job::schema))]
pub struct ValidationError {
    summary: String,

    #[source_code]
    src: NamedSource<String>,

    #[related]
    violations: Vec<SchemaViolation>,
}

/// A single schema violation
#[derive(Debug, Error, Diagnostic)]
#[error("{message}")]
pub struct SchemaViolation {
    #[label("{}", self.hint)]
    span: SourceSpan,

    message: String,
    hint: String,

    #[help]
    help: Option<String>,
}

impl SchemaViolation {
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn offset(&self) -> usize {
        self.span.offset()
    }
}

impl ValidationError {
    fn new(filename: &str, source: &str, violations: Vec<SchemaViolation>) -> Self {
        let summary = match violations.len() {
            1 => "1 error".to_string(),
            n => format!("{} errors", n),
        };
        Self {
            summary,
            src: NamedSource::new(filename, source.to_string()),
            violations,
        }
    }

    pub fn violations(&self) -> &[SchemaViolation] {
        &self.violations
    }
}

/// Compiled job file schema
pub struct JobValidator {
    compiled: JsonValidator,
}

impl JobValidator {
    pub fn new() -> Result<Self, SchemaLoadError> {
        let load_error = |message: String| SchemaLoadError {
            name: JOB_SCHEMA.to_string(),
            message,
        };

        let file = EmbeddedSchemas::get(JOB_SCHEMA).ok_or_else(|| load_error("not embedded".into()))?;
        let schema: JsonValue =
            serde_json::from_slice(&file.data).map_err(|e| load_error(e.to_string()))?;
        let compiled = validator_for(&schema).map_err(|e| load_error(e.to_string()))?;

        Ok(Self { compiled })
    }

    /// Check a job document, collecting every violation
    pub fn validate(&self, content: &str, filename: &str) -> Result<(), ValidationError> {
        let yaml_value: serde_yml::Value = serde_yml::from_str(content).map_err(|e| {
            let offset = e
                .location()
                .map(|loc| line_col_to_offset(content, loc.line(), loc.column()))
                .unwrap_or(0);
            let violation = SchemaViolation {
                span: line_span(content, offset),
                message: format!("YAML parse error: {}", e),
                hint: "invalid YAML".to_string(),
                help: Some("Check YAML syntax: indentation, colons and quotes".to_string()),
            };
            ValidationError::new(filename, content, vec![violation])
        })?;

        // An empty document is an empty job
        if yaml_value.is_null() {
            return Ok(());
        }

        let json_value: JsonValue = serde_json::to_value(&yaml_value).map_err(|e| {
            let violation = SchemaViolation {
                span: (0, content.len()).into(),
                message: format!("Failed to convert YAML to JSON: {}", e),
                hint: "conversion error".to_string(),
                help: None,
            };
            ValidationError::new(filename, content, vec![violation])
        })?;

        let violations: Vec<SchemaViolation> = self
            .compiled
            .iter_errors(&json_value)
            .map(|e| error_to_violation(content, &e))
            .collect();

        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(filename, content, violations))
        }
    }
}

fn error_to_violation(content: &str, error: &JsonSchemaError) -> SchemaViolation {
    let path = error.instance_path.to_string();
    SchemaViolation {
        span: find_path_span(content, &path),
        message: format_schema_error(error),
        hint: format_error_hint(error),
        help: generate_help_message(error),
    }
}

fn property_name(property: &JsonValue) -> String {
    property
        .as_str()
        .map(str::to_string)
        .unwrap_or_else(|| property.to_string())
}

fn format_schema_error(error: &JsonSchemaError) -> String {
    let path = if error.instance_path.as_str().is_empty() {
        "document root".to_string()
    } else {
        format!("'{}'", error.instance_path)
    };

    match &error.kind {
        ValidationErrorKind::Required { property } => {
            format!("Missing required field: {} at {}", property_name(property), path)
        }
        ValidationErrorKind::Type { kind } => {
            format!("Wrong type at {}: expected {:?}", path, kind)
        }
        ValidationErrorKind::Pattern { .. } => {
            format!("Value at {} is not a step name", path)
        }
        ValidationErrorKind::MinLength { .. } => {
            format!("Value at {} must not be empty", path)
        }
        ValidationErrorKind::Minimum { limit } => {
            format!("Value at {} is too small: minimum {}", path, limit)
        }
        ValidationErrorKind::AdditionalProperties { unexpected } => {
            format!("Unknown field(s) at {}: {}", path, unexpected.join(", "))
        }
        _ => format!("Validation error at {}: {}", path, error),
    }
}

fn format_error_hint(error: &JsonSchemaError) -> String {
    match &error.kind {
        ValidationErrorKind::Required { .. } => "required field missing",
        ValidationErrorKind::Type { .. } => "wrong type",
        ValidationErrorKind::Pattern { .. } => "not a step",
        ValidationErrorKind::MinLength { .. } => "empty",
        ValidationErrorKind::Minimum { .. } => "too small",
        ValidationErrorKind::AdditionalProperties { .. } => "unknown field",
        _ => "validation error",
    }
    .to_string()
}

fn generate_help_message(error: &JsonSchemaError) -> Option<String> {
    match &error.kind {
        ValidationErrorKind::Required { property } => {
            Some(format!("Add the '{}' field", property_name(property)))
        }
        ValidationErrorKind::Pattern { .. } => {
            Some("Steps are written as 'Step 3' or 'Step 5（2）'".to_string())
        }
        ValidationErrorKind::Minimum { .. } if error.instance_path.as_str().ends_with("ship_quantity") => {
            Some("The shipment quantity must be a positive whole number".to_string())
        }
        ValidationErrorKind::Type { kind } => Some(format!("Expected value of type: {:?}", kind)),
        ValidationErrorKind::AdditionalProperties { unexpected } => match unexpected.as_slice() {
            [one] => Some(format!("Remove the '{}' field or check spelling", one)),
            _ => Some("Remove unknown fields or check spelling".to_string()),
        },
        _ => None,
    }
}

/// Span from `offset` to the end of its line
fn line_span(content: &str, offset: usize) -> SourceSpan {
    let offset = offset.min(content.len());
    let len = content[offset..].find('\n').unwrap_or(content.len() - offset).max(1);
    (offset, len).into()
}

/// Find the span for a JSON pointer such as `/basic/ship_quantity` or `/defects/0`
fn find_path_span(content: &str, json_path: &str) -> SourceSpan {
    let parts: Vec<&str> = json_path.split('/').filter(|s| !s.is_empty()).collect();

    // Array elements have no key of their own; point at the list instead
    let key = parts
        .iter()
        .rev()
        .find(|part| part.parse::<usize>().is_err());

    key.and_then(|key| find_key_span(content, key))
        .unwrap_or_else(|| line_span(content, 0))
}

/// Span of the first line starting with `key:`
fn find_key_span(content: &str, key: &str) -> Option<SourceSpan> {
    let search_pattern = format!("{}:", key);
    let mut offset = 0;

    for line in content.lines() {
        let trimmed = line.trim_start().trim_start_matches("- ");
        if trimmed.starts_with(&search_pattern) {
            let key_start = offset + (line.len() - trimmed.len());
            return Some((key_start, trimmed.len()).into());
        }
        offset += line.len() + 1;
    }
    None
}
