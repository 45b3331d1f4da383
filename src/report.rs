//! Column reports over resource records.
//!
//! Renders a record set into an aligned text table using a descriptor's
//! ordered default report fields, with dot-notation field extraction.

use crate::registry::types::ResourceRecord;
use serde_json::Value;

/// Extract a value from a record using a dot-notation path.
pub fn field_value(record: &ResourceRecord, path: &str) -> String {
    let mut current = record;

    for part in path.split('.') {
        // Handle array index
        if let Ok(idx) = part.parse::<usize>() {
            current = match current.get(idx) {
                Some(v) => v,
                None => return "-".to_string(),
            };
        } else {
            current = match current.get(part) {
                Some(v) => v,
                None => return "-".to_string(),
            };
        }
    }

    match current {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "-".to_string(),
        Value::Array(arr) => format!("[{} items]", arr.len()),
        Value::Object(_) => "[object]".to_string(),
    }
}

/// Render records into an aligned table, one column per report field.
pub fn render_table(records: &[ResourceRecord], fields: &[String]) -> String {
    let mut rows: Vec<Vec<String>> = Vec::with_capacity(records.len() + 1);
    rows.push(fields.iter().map(|f| f.to_uppercase()).collect());
    for record in records {
        rows.push(fields.iter().map(|f| field_value(record, f)).collect());
    }

    let mut widths = vec![0usize; fields.len()];
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.len());
        }
    }

    let mut out = String::new();
    for row in &rows {
        let line: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, cell)| format!("{:<width$}", cell, width = widths[i]))
            .collect();
        out.push_str(line.join("  ").trim_end());
        out.push('\n');
    }
    out
}
