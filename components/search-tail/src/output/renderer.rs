//! Renderer
//!
//! Formats one document as a line (or a few lines) of text. Rendering is a
//! pure function of the document and the format, so re-rendering the same
//! document always yields the same bytes.

// External crates
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Nesting level past which containers are elided as `{...}` / `[...]`.
pub const STRUCTURED_MAX_DEPTH: usize = 1;

/// Column budget of a single structured line before entries are broken out.
pub const STRUCTURED_WIDTH: usize = 250;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to write to output: {0}")]
    Write(#[from] std::io::Error),
}

/// Output style, `--format`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// `key=value` pairs on one line
    Kv,
    /// Depth and width bounded pretty-print
    #[default]
    Json,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Renderer {
    format: OutputFormat,
}

impl Renderer {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Render a document without a trailing newline.
    #[must_use]
    pub fn render(&self, document: &Value) -> String {
        match self.format {
            OutputFormat::Kv => render_kv(document),
            OutputFormat::Json => render_structured(document),
        }
    }

    /// Render a document and write it as one record, newline terminated.
    pub async fn write_document<W>(&self, sink: &mut W, document: &Value) -> Result<(), RenderError>
    where
        W: AsyncWrite + Unpin,
    {
        let mut line = self.render(document);
        line.push('\n');
        sink.write_all(line.as_bytes()).await?;
        Ok(())
    }
}

//
// ------------------------ kv ------------------------------
//

fn render_kv(document: &Value) -> String {
    match document {
        Value::Object(fields) => fields
            .iter()
            .map(|(key, value)| format!("{key}={}", raw_value(value)))
            .collect::<Vec<_>>()
            .join(" "),
        other => raw_value(other),
    }
}

/// Strings as-is, everything else as compact JSON.
fn raw_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

//
// ------------------------ structured ------------------------------
//

fn render_structured(document: &Value) -> String {
    let line = compact(document, 0);
    if line.len() <= STRUCTURED_WIDTH {
        return line;
    }

    // Too wide: one top-level entry per line, continuation lines indented by
    // a single space.
    match document {
        Value::Object(fields) if !fields.is_empty() => {
            let entries: Vec<String> = fields
                .iter()
                .map(|(key, value)| format!("{}: {}", quote(key), compact(value, 1)))
                .collect();
            format!("{{{}}}", entries.join(",\n "))
        }
        Value::Array(items) if !items.is_empty() => {
            let entries: Vec<String> = items.iter().map(|item| compact(item, 1)).collect();
            format!("[{}]", entries.join(",\n "))
        }
        _ => line,
    }
}

fn compact(value: &Value, level: usize) -> String {
    match value {
        Value::Object(fields) => compact_object(fields, level),
        Value::Array(items) if items.is_empty() => "[]".to_string(),
        Value::Array(_) if level >= STRUCTURED_MAX_DEPTH => "[...]".to_string(),
        Value::Array(items) => {
            let entries: Vec<String> = items.iter().map(|item| compact(item, level + 1)).collect();
            format!("[{}]", entries.join(", "))
        }
        Value::String(s) => quote(s),
        other => other.to_string(),
    }
}

fn compact_object(fields: &Map<String, Value>, level: usize) -> String {
    if fields.is_empty() {
        return "{}".to_string();
    }
    if level >= STRUCTURED_MAX_DEPTH {
        return "{...}".to_string();
    }

    let entries: Vec<String> = fields
        .iter()
        .map(|(key, value)| format!("{}: {}", quote(key), compact(value, level + 1)))
        .collect();
    format!("{{{}}}", entries.join(", "))
}

fn quote(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}
