//! Minimal CSV reader/writer for template and history files.
//!
//! Comma delimiter, double-quote escaping, header row required. Rows are
//! JSON objects so that typed records and loosely shaped import files go
//! through the same path.
use serde_json::{Map, Value};

/// A CSV row keyed by header name, in header order
pub type CsvRow = Map<String, Value>;

/// Quotes a value when it contains a comma, a newline or a quote.
pub fn escape_csv_value(value: Option<&str>) -> String {
    let value = match value {
        Some(v) => v,
        None => return String::new(),
    };

    if value.contains(',') || value.contains('\n') || value.contains('"') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn cell_text(value: Option<&Value>) -> Option<String> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
    }
}

/// Serializes rows using the keys of the first row as the header.
pub fn convert_to_csv(rows: &[CsvRow]) -> String {
    let first = match rows.first() {
        Some(row) => row,
        None => return String::new(),
    };

    let headers: Vec<&String> = first.keys().collect();
    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(
        headers
            .iter()
            .map(|h| escape_csv_value(Some(h)))
            .collect::<Vec<_>>()
            .join(","),
    );

    for row in rows {
        let line = headers
            .iter()
            .map(|h| {
                let text = cell_text(row.get(h.as_str())).unwrap_or_default();
                escape_csv_value(Some(&text))
            })
            .collect::<Vec<_>>()
            .join(",");
        lines.push(line);
    }

    lines.join("\n")
}

/// Parses CSV text into rows of trimmed string values.
///
/// Blank lines are skipped, and so is any row whose field count differs from
/// the header's. Fewer than two non-blank lines yields no rows.
pub fn parse_csv(text: &str) -> Vec<CsvRow> {
    let lines: Vec<&str> = text.split('\n').filter(|l| !l.trim().is_empty()).collect();
    if lines.len() < 2 {
        return Vec::new();
    }

    let headers = parse_csv_line(lines[0]);
    lines[1..]
        .iter()
        .map(|line| parse_csv_line(line))
        .filter(|values| values.len() == headers.len())
        .map(|values| {
            headers
                .iter()
                .zip(values)
                .map(|(h, v)| (h.trim().to_string(), Value::String(v.trim().to_string())))
                .collect()
        })
        .collect()
}

fn parse_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            other => current.push(other),
        }
    }

    fields.push(current);
    fields
}
