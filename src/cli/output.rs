//! Rendering command results in the selected output format

use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::io::{self, Write};
use tabled::{builder::Builder, settings::Style};

use crate::cli::OutputFormat;

/// Rows with a header line, printable as a table, TSV or CSV
pub struct Table {
    headers: Vec<&'static str>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: &[&'static str]) -> Self {
        Self {
            headers: headers.to_vec(),
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn render(&self, format: OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Tsv => {
                let mut out = self.headers.join("\t");
                out.push('\n');
                for row in &self.rows {
                    out.push_str(&row.join("\t"));
                    out.push('\n');
                }
                Ok(out)
            }
            OutputFormat::Csv => {
                let mut writer = csv::Writer::from_writer(Vec::new());
                writer.write_record(&self.headers).into_diagnostic()?;
                for row in &self.rows {
                    writer.write_record(row).into_diagnostic()?;
                }
                let bytes = writer.into_inner().into_diagnostic()?;
                String::from_utf8(bytes).into_diagnostic()
            }
            _ => {
                let mut builder = Builder::default();
                builder.push_record(self.headers.iter().map(|h| h.to_string()));
                for row in &self.rows {
                    builder.push_record(row.iter().cloned());
                }
                let mut out = builder.build().with(Style::markdown()).to_string();
                out.push('\n');
                Ok(out)
            }
        }
    }
}

/// Serialize `value` for the JSON and YAML formats. Returns `false` for the
/// tabular formats so the caller renders its own view.
pub fn print_structured<T: Serialize>(format: OutputFormat, value: &T) -> Result<bool> {
    let text = match format {
        OutputFormat::Json => serde_json::to_string_pretty(value).into_diagnostic()?,
        OutputFormat::Yaml => serde_yml::to_string(value).into_diagnostic()?,
        _ => return Ok(false),
    };
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", text.trim_end()).into_diagnostic()?;
    Ok(true)
}

pub fn print_table(format: OutputFormat, table: &Table) -> Result<()> {
    let mut stdout = io::stdout().lock();
    write!(stdout, "{}", table.render(format)?).into_diagnostic()
}
