//! Report export: structured, tabular, and deferred document encodings.

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Requested output encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportEncoding {
    /// The report as-is, nested.
    Structured,
    /// Two CSV rows: flattened key paths, then values.
    Tabular,
    /// Deferred document generation; the caller gets a retrieval reference.
    Document,
}

impl ExportEncoding {
    /// Parse a wire token.
    pub fn parse(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "structured" => Some(ExportEncoding::Structured),
            "tabular" => Some(ExportEncoding::Tabular),
            "document" => Some(ExportEncoding::Document),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExportEncoding::Structured => "structured",
            ExportEncoding::Tabular => "tabular",
            ExportEncoding::Document => "document",
        }
    }
}

/// Export failures.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The requested encoding is not recognized.
    #[error("unsupported export format: {0}")]
    UnsupportedFormat(String),

    /// Encoding the report failed.
    #[error("export encoding failed: {0}")]
    Encode(String),
}

/// Output of a formatting call.
#[derive(Debug, Clone)]
pub enum ExportOutput {
    Structured(Value),
    Tabular(String),
    Document(ExportReference),
}

/// Retrieval reference for a deferred document export.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportReference {
    pub export_id: String,
    pub filename: String,
    pub content_type: String,
}

/// Format a report payload into the requested encoding.
///
/// The caller is responsible for attaching a filename/timestamp to inline
/// outputs; the document encoding carries its own reference.
pub fn format(report: &Value, encoding: ExportEncoding) -> Result<ExportOutput, ExportError> {
    match encoding {
        ExportEncoding::Structured => Ok(ExportOutput::Structured(report.clone())),
        ExportEncoding::Tabular => Ok(ExportOutput::Tabular(to_tabular(report)?)),
        ExportEncoding::Document => {
            let export_id = format!("exp-{}", hex_token(8));
            let filename = format!("steeple-report-{export_id}.pdf");
            Ok(ExportOutput::Document(ExportReference {
                export_id,
                filename,
                content_type: "application/pdf".to_string(),
            }))
        }
    }
}

/// Flatten a nested value into `(dot.joined.path, scalar)` pairs.
///
/// Object keys iterate in sorted order and array elements by index, so the
/// output order is deterministic for a given report.
pub fn flatten(value: &Value) -> Vec<(String, String)> {
    let mut out = Vec::new();
    flatten_into("", value, &mut out);
    out
}

fn flatten_into(prefix: &str, value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten_into(&path, child, out);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                let path = if prefix.is_empty() {
                    index.to_string()
                } else {
                    format!("{prefix}.{index}")
                };
                flatten_into(&path, child, out);
            }
        }
        Value::Null => out.push((prefix.to_string(), String::new())),
        Value::Bool(b) => out.push((prefix.to_string(), b.to_string())),
        Value::Number(n) => out.push((prefix.to_string(), n.to_string())),
        Value::String(s) => out.push((prefix.to_string(), s.clone())),
    }
}

fn to_tabular(report: &Value) -> Result<String, ExportError> {
    let flat = flatten(report);
    if flat.is_empty() {
        return Ok(String::new());
    }

    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::NonNumeric)
        .from_writer(Vec::new());

    writer
        .write_record(flat.iter().map(|(path, _)| path.as_str()))
        .map_err(|e| ExportError::Encode(e.to_string()))?;
    writer
        .write_record(flat.iter().map(|(_, value)| value.as_str()))
        .map_err(|e| ExportError::Encode(e.to_string()))?;

    let bytes = writer
        .into_inner()
        .map_err(|e| ExportError::Encode(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| ExportError::Encode(e.to_string()))
}

fn hex_token(bytes: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..bytes)
        .map(|_| format!("{:02x}", rng.gen::<u8>()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn report() -> Value {
        json!({
            "performance": {"totalStreams": 28, "successRate": 1.0},
            "costs": {"currentPeriod": 700.0},
            "trends": [{"cost": 100.0}, {"cost": 200.0}],
            "label": "weekly, usage"
        })
    }

    #[test]
    fn encoding_tokens_parse() {
        assert_eq!(
            ExportEncoding::parse("tabular"),
            Some(ExportEncoding::Tabular)
        );
        assert_eq!(
            ExportEncoding::parse("Document"),
            Some(ExportEncoding::Document)
        );
        assert_eq!(ExportEncoding::parse("xml"), None);
    }

    #[test]
    fn flatten_uses_sorted_dotted_paths() {
        let flat = flatten(&report());
        let paths: Vec<&str> = flat.iter().map(|(p, _)| p.as_str()).collect();
        assert!(paths.contains(&"performance.totalStreams"));
        assert!(paths.contains(&"trends.0.cost"));
        assert!(paths.contains(&"trends.1.cost"));

        // Sorted object keys make the layout deterministic.
        let mut sorted = paths.clone();
        sorted.sort();
        assert_eq!(paths, sorted);
    }

    #[test]
    fn tabular_output_is_two_rows_and_byte_stable() {
        let first = match format(&report(), ExportEncoding::Tabular).unwrap() {
            ExportOutput::Tabular(csv) => csv,
            other => panic!("expected tabular output, got {other:?}"),
        };
        let second = match format(&report(), ExportEncoding::Tabular).unwrap() {
            ExportOutput::Tabular(csv) => csv,
            other => panic!("expected tabular output, got {other:?}"),
        };

        assert_eq!(first, second);
        assert_eq!(first.trim_end().lines().count(), 2);
        // A string value containing a comma survives quoting.
        assert!(first.contains("\"weekly, usage\""));
    }

    #[test]
    fn structured_output_is_the_report_itself() {
        match format(&report(), ExportEncoding::Structured).unwrap() {
            ExportOutput::Structured(value) => assert_eq!(value, report()),
            other => panic!("expected structured output, got {other:?}"),
        }
    }

    #[test]
    fn document_reference_embeds_the_export_id() {
        match format(&report(), ExportEncoding::Document).unwrap() {
            ExportOutput::Document(reference) => {
                assert!(reference.export_id.starts_with("exp-"));
                assert!(reference.filename.contains(&reference.export_id));
                assert_eq!(reference.content_type, "application/pdf");
            }
            other => panic!("expected document reference, got {other:?}"),
        }
    }

    #[test]
    fn empty_report_flattens_to_nothing() {
        assert!(flatten(&json!({})).is_empty());
        let csv = match format(&json!({}), ExportEncoding::Tabular).unwrap() {
            ExportOutput::Tabular(csv) => csv,
            other => panic!("expected tabular output, got {other:?}"),
        };
        assert!(csv.trim().is_empty() || csv.lines().count() <= 2);
    }
}
