//! YAML error diagnostics pointing at the offending line

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// YAML syntax or shape error with source location
#[derive(Debug, Error, Diagnostic)]
#[error("{message}")]
#[diagnostic(code(qcr::yaml::syntax))]
pub struct YamlSyntaxError {
    #[source_code]
    src: NamedSource<String>,

    #[label("error here")]
    span: SourceSpan,

    #[help]
    help: Option<String>,

    message: String,
}

impl YamlSyntaxError {
    /// Build from a serde_yml error, using its location when it has one
    pub fn from_serde_error(err: &serde_yml::Error, source: &str, filename: &str) -> Self {
        let (line, column) = err
            .location()
            .map(|loc| (loc.line(), loc.column()))
            .unwrap_or((1, 1));

        let offset = line_col_to_offset(source, line, column);
        let message = err.to_string();
        let help = generate_help(&message);

        Self {
            src: NamedSource::new(filename, source.to_string()),
            span: SourceSpan::from(offset..offset.saturating_add(1)),
            help,
            message,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Byte offset the label points at
    pub fn offset(&self) -> usize {
        self.span.offset()
    }
}

/// Convert a 1-based line/column to a byte offset
pub(crate) fn line_col_to_offset(source: &str, line: usize, column: usize) -> usize {
    let mut current_line = 1;
    let mut line_start = 0;

    for (i, ch) in source.char_indices() {
        if current_line == line {
            break;
        }
        if ch == '\n' {
            current_line += 1;
            line_start = i + 1;
        }
    }
    if current_line < line {
        return source.len().saturating_sub(1);
    }

    source[line_start..]
        .char_indices()
        .take_while(|(_, c)| *c != '\n')
        .nth(column.saturating_sub(1))
        .map(|(j, _)| line_start + j)
        .unwrap_or_else(|| {
            let line_len = source[line_start..].find('\n').unwrap_or(source.len() - line_start);
            line_start + line_len
        })
}

fn generate_help(message: &str) -> Option<String> {
    let msg = message.to_lowercase();

    if msg.contains("tab") {
        return Some("YAML requires spaces for indentation, not tabs.".to_string());
    }
    if msg.contains("duplicate") {
        return Some("Each key can only appear once. Remove or rename the duplicate key.".to_string());
    }
    if msg.contains("unknown field") {
        return Some("Check the key name for typos; see `qcr config show` for valid keys.".to_string());
    }
    if msg.contains("expected block end") || msg.contains("did not find expected") {
        return Some("Check your indentation, it may be inconsistent.".to_string());
    }
    if msg.contains("mapping values are not allowed") {
        return Some("You may be missing a space after ':' or have incorrect indentation.".to_string());
    }
    if msg.contains("invalid type") {
        return Some("Quote text values and leave numbers unquoted.".to_string());
    }
    if msg.contains("invalid step") {
        return Some("Steps are written as 'Step 3' or 'Step 5（2）'.".to_string());
    }

    None
}
