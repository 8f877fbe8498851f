//! CSV serialization of feature rows. Column order is the sorted union of
//! every key seen across the batch, with the label moved to the final
//! column. Missing cells zero-fill (numeric) or blank-fill (string).

use std::collections::BTreeSet;
use std::io::Write;

use serde_json::Value;

use crate::errors::SiftError;

use super::rows::FeatureRow;

pub fn write_csv<W: Write>(rows: &[FeatureRow], out: &mut W) -> Result<usize, SiftError> {
    let columns = column_order(rows);

    let header: Vec<String> = columns.iter().map(|c| escape(c)).collect();
    writeln!(out, "{}", header.join(","))?;

    for row in rows {
        let cells: Vec<String> = columns.iter().map(|col| cell(row, col)).collect();
        writeln!(out, "{}", cells.join(","))?;
    }
    out.flush()?;
    Ok(rows.len())
}

fn column_order(rows: &[FeatureRow]) -> Vec<String> {
    let mut columns: BTreeSet<&str> = BTreeSet::new();
    for row in rows {
        columns.extend(row.keys().map(String::as_str));
    }
    let mut ordered: Vec<String> = columns
        .iter()
        .filter(|c| **c != "label")
        .map(|c| c.to_string())
        .collect();
    if columns.contains("label") {
        ordered.push("label".to_string());
    }
    ordered
}

fn cell(row: &FeatureRow, col: &str) -> String {
    match row.get(col) {
        Some(Value::String(s)) => escape(s),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => i64::from(*b).to_string(),
        Some(other) => escape(&other.to_string()),
        // Absent string columns blank-fill, everything else zero-fills
        None if string_column(col) => String::new(),
        None => "0".to_string(),
    }
}

fn string_column(col: &str) -> bool {
    col == "notes_text"
}

fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
