//! Output formatting for the treesync CLI (table, json, csv)

use clap::ValueEnum;
use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tabled::{Table, Tabled};

/// Output format options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// ASCII table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
    /// CSV format
    Csv,
}

/// Context for output rendering
pub struct OutputContext {
    pub format: OutputFormat,
    pub quiet: bool,
}

impl OutputContext {
    pub fn new(format: OutputFormat, no_color: bool, quiet: bool) -> Self {
        if no_color {
            colored::control::set_override(false);
        }
        Self { format, quiet }
    }

    /// Print a success message (unless in quiet mode)
    pub fn success(&self, msg: &str) {
        if !self.quiet {
            eprintln!("{}", msg.green());
        }
    }

    /// Print an info message (unless in quiet mode)
    pub fn info(&self, msg: &str) {
        if !self.quiet {
            eprintln!("{}", msg);
        }
    }

    /// Print an error message
    pub fn error(&self, msg: &str) {
        eprintln!("{}", msg.red());
    }

    /// Print a heading line (table format only)
    pub fn heading(&self, kind: &str, path: &str) {
        if self.format == OutputFormat::Table {
            println!("{} {}", kind.bold().cyan(), path);
        }
    }

    /// Print data in the configured format
    pub fn print<T: Tabled + Serialize>(&self, data: &[T]) {
        match self.format {
            OutputFormat::Table => {
                if data.is_empty() {
                    if !self.quiet {
                        println!("{}", "(no value)".dimmed());
                    }
                } else {
                    let table = Table::new(data).to_string();
                    println!("{}", table);
                }
            }
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(data).unwrap_or_else(|_| "[]".to_string())
                );
            }
            OutputFormat::Csv => {
                print_csv(data, true);
            }
        }
    }
}

/// Print data as CSV, optionally preceded by a header row
pub fn print_csv<T: Serialize>(data: &[T], header: bool) {
    for line in csv_lines(data, header) {
        println!("{}", line);
    }
}

fn csv_lines<T: Serialize>(data: &[T], header: bool) -> Vec<String> {
    let mut lines = Vec::new();
    let Some(first) = data.first() else {
        return lines;
    };

    // Get field names from the first item
    let first = serde_json::to_value(first).unwrap_or_default();
    if let Value::Object(map) = &first {
        let headers: Vec<&str> = map.keys().map(|s| s.as_str()).collect();
        if header {
            lines.push(headers.join(","));
        }

        for item in data {
            if let Ok(Value::Object(row)) = serde_json::to_value(item) {
                let values: Vec<String> = headers
                    .iter()
                    .map(|h| {
                        row.get(*h)
                            .map(|v| match v {
                                Value::String(s) => escape_csv(s),
                                other => escape_csv(&other.to_string()),
                            })
                            .unwrap_or_default()
                    })
                    .collect();
                lines.push(values.join(","));
            }
        }
    }
    lines
}

/// Escape a value for CSV output
fn escape_csv(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Render a scalar for display
pub fn format_json_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// Flatten a tree into one row per leaf, paths rooted at `prefix`
pub fn leaf_rows(value: &Value, prefix: &str) -> Vec<LeafRow> {
    let mut rows = Vec::new();
    collect_leaves(value, prefix.trim_end_matches('/'), &mut rows);
    rows
}

fn collect_leaves(value: &Value, path: &str, rows: &mut Vec<LeafRow>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                collect_leaves(child, &format!("{}/{}", path, key), rows);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                collect_leaves(child, &format!("{}/{}", path, index), rows);
            }
        }
        Value::Null => {}
        scalar => rows.push(LeafRow {
            path: if path.is_empty() { "/".to_string() } else { path.to_string() },
            value: format_json_value(scalar),
        }),
    }
}

// =============================================================================
// Display types
// =============================================================================

/// One leaf of a snapshot
#[derive(Debug, Clone, PartialEq, Tabled, Serialize)]
pub struct LeafRow {
    #[tabled(rename = "Path")]
    pub path: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

/// One changed leaf in a streamed CSV
#[derive(Debug, Serialize)]
pub struct ChangeRow {
    pub kind: String,
    pub path: String,
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn row(path: &str, value: &str) -> LeafRow {
        LeafRow {
            path: path.into(),
            value: value.into(),
        }
    }

    #[test]
    fn test_leaf_rows_nested() {
        let value = json!({"lobby": {"topic": "hi", "members": 2}, "open": true});
        let mut rows = leaf_rows(&value, "/");
        rows.sort_by(|a, b| a.path.cmp(&b.path));

        assert_eq!(
            rows,
            vec![
                row("/lobby/members", "2"),
                row("/lobby/topic", "hi"),
                row("/open", "true"),
            ]
        );
    }

    #[test]
    fn test_leaf_rows_scalar_and_prefix() {
        assert_eq!(leaf_rows(&json!(5), "/"), vec![row("/", "5")]);
        assert_eq!(leaf_rows(&json!(5), "/a/b"), vec![row("/a/b", "5")]);
        assert_eq!(
            leaf_rows(&json!(["x", "y"]), "/list"),
            vec![row("/list/0", "x"), row("/list/1", "y")]
        );
        assert!(leaf_rows(&json!(null), "/").is_empty());
    }

    #[test]
    fn test_csv_lines_escape() {
        let rows = vec![row("/a", "x,y"), row("/b", "say \"hi\"")];
        assert_eq!(
            csv_lines(&rows, true),
            vec![
                "path,value".to_string(),
                "/a,\"x,y\"".to_string(),
                "/b,\"say \"\"hi\"\"\"".to_string(),
            ]
        );
        assert_eq!(csv_lines(&rows, false).len(), 2);
    }
}
