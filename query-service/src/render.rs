//! Plain-text rendering of query results.

use common::models::QueryResult;
use serde_json::Value;

const GAP: &str = "  ";

fn cell(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Renders every row as a right-aligned table with a leading row index.
pub fn render_table(result: &QueryResult) -> String {
    let headers: Vec<&str> = result.columns.iter().map(|c| c.name.as_str()).collect();
    if result.rows.is_empty() {
        return format!("Empty result (columns: {})", headers.join(", "));
    }

    let cells: Vec<Vec<String>> = result
        .rows
        .iter()
        .map(|row| row.iter().map(cell).collect())
        .collect();

    let index_width = (result.rows.len() - 1).to_string().len();
    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(i, name)| {
            cells
                .iter()
                .filter_map(|row| row.get(i))
                .map(|c| c.chars().count())
                .chain(std::iter::once(name.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut lines = Vec::with_capacity(cells.len() + 1);
    let mut header = " ".repeat(index_width);
    for (name, width) in headers.iter().zip(&widths) {
        header.push_str(GAP);
        header.push_str(&pad(name, *width));
    }
    lines.push(header);

    for (index, row) in cells.iter().enumerate() {
        let mut line = pad(&index.to_string(), index_width);
        for (value, width) in row.iter().zip(&widths) {
            line.push_str(GAP);
            line.push_str(&pad(value, *width));
        }
        lines.push(line);
    }
    lines.join("\n")
}

fn pad(text: &str, width: usize) -> String {
    let len = text.chars().count();
    format!("{}{}", " ".repeat(width.saturating_sub(len)), text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::models::ColumnInfo;
    use serde_json::json;

    fn result(columns: &[&str], rows: Vec<Vec<Value>>) -> QueryResult {
        let mut result = QueryResult::empty(
            columns
                .iter()
                .map(|name| ColumnInfo {
                    name: name.to_string(),
                    data_type: "TEXT".to_string(),
                })
                .collect(),
        );
        result.row_count = rows.len();
        result.rows = rows;
        result
    }

    #[test]
    fn test_render_aligns_right() {
        let out = render_table(&result(
            &["id", "name"],
            vec![
                vec![json!(1), json!("alice")],
                vec![json!(20), Value::Null],
            ],
        ));
        assert_eq!(out, "   id   name\n0   1  alice\n1  20   NULL");
    }

    #[test]
    fn test_render_prints_every_row() {
        let rows = (0..250).map(|i| vec![json!(i)]).collect();
        let out = render_table(&result(&["n"], rows));
        assert_eq!(out.lines().count(), 251);
        assert!(out.ends_with("249  249"));
    }

    #[test]
    fn test_render_empty() {
        let out = render_table(&result(&["id", "name"], vec![]));
        assert_eq!(out, "Empty result (columns: id, name)");
    }
}
