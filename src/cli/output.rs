use serde_json::Value;
use terminal_size::{terminal_size, Height, Width};

const MIN_COL_WIDTH: usize = 3;
const FALLBACK_WIDTH: usize = 80;

/// Table for list-shaped bodies: a top-level array, or a paginated `{"results": [...]}`.
/// Fitted to the terminal width. Returns `None` when the body is not a non-empty list.
pub fn render_table(val: &Value) -> Option<String> { render_table_width(val, terminal_width()) }

/// Like [`render_table`], fitted to `max_width` columns instead of the terminal.
pub fn render_table_width(val: &Value, max_width: usize) -> Option<String> {
    let rows = match val {
        Value::Array(arr) => arr,
        Value::Object(map) => map.get("results")?.as_array()?,
        _ => return None,
    };
    if rows.is_empty() { return None; }

    // Columns: union of object keys in first-seen order; scalars go in one "value" column.
    let mut cols: Vec<String> = Vec::new();
    let all_objects = rows.iter().all(|r| r.is_object());
    if all_objects {
        for r in rows {
            if let Value::Object(m) = r {
                for k in m.keys() {
                    if !cols.contains(k) { cols.push(k.clone()); }
                }
            }
        }
    } else {
        cols.push("value".to_string());
    }

    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|r| match r {
            Value::Object(m) if all_objects => cols.iter().map(|c| cell_text(m.get(c).unwrap_or(&Value::Null))).collect(),
            other => vec![cell_text(other)],
        })
        .collect();

    let mut widths: Vec<usize> = cols.iter().map(|c| c.chars().count()).collect();
    for row in &cells {
        for (i, c) in row.iter().enumerate() {
            widths[i] = widths[i].max(c.chars().count());
        }
    }
    fit_widths(&mut widths, max_width);

    let sep = separator(&widths);
    let mut out = String::new();
    out.push_str(&sep);
    out.push_str(&row_line(&cols, &widths));
    out.push_str(&sep);
    for row in &cells {
        out.push_str(&row_line(row, &widths));
    }
    out.push_str(&sep);
    out.push_str(&format!("rows: {}\n", cells.len()));
    Some(out)
}

/// Table when the body is a list (unless `force_json`), pretty JSON otherwise.
pub fn render_value(val: &Value, force_json: bool) -> String {
    if !force_json {
        if let Some(t) = render_table(val) { return t; }
    }
    serde_json::to_string_pretty(val).unwrap_or_else(|_| val.to_string())
}

fn terminal_width() -> usize {
    match terminal_size() {
        Some((Width(w), Height(_))) if w > 4 => (w - 4) as usize,
        _ => FALLBACK_WIDTH,
    }
}

/// Shrink the widest columns until the rendered line fits `max_width`.
/// A column never goes below `MIN_COL_WIDTH`.
fn fit_widths(widths: &mut [usize], max_width: usize) {
    // "| " + cell + " " per column, plus the closing "|".
    let line_len = |w: &[usize]| w.iter().map(|x| x + 3).sum::<usize>() + 1;
    while line_len(&*widths) > max_width {
        let Some((i, &w)) = widths.iter().enumerate().max_by_key(|(_, w)| **w) else { return };
        if w <= MIN_COL_WIDTH { return; }
        widths[i] = w - 1;
    }
}

fn cell_text(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn separator(widths: &[usize]) -> String {
    let mut s = String::from("+");
    for w in widths {
        s.push_str(&"-".repeat(w + 2));
        s.push('+');
    }
    s.push('\n');
    s
}

fn row_line(cells: &[String], widths: &[usize]) -> String {
    let mut s = String::from("|");
    for (c, w) in cells.iter().zip(widths) {
        let text = truncate(c, *w);
        let pad = w - text.chars().count();
        s.push(' ');
        s.push_str(&text);
        s.push_str(&" ".repeat(pad + 1));
        s.push('|');
    }
    s.push('\n');
    s
}

fn truncate(s: &str, width: usize) -> String {
    let n = s.chars().count();
    if n <= width { return s.to_string(); }
    let mut t: String = s.chars().take(width.saturating_sub(1)).collect();
    t.push('…');
    t
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn paginated_results_become_a_table() {
        let body = json!({"count": 2, "results": [
            {"id": 1, "name": "Yoga", "instructor": null},
            {"id": 2, "name": "Spin", "capacity": 20}
        ]});
        let t = render_table_width(&body, 120).unwrap();
        let lines: Vec<&str> = t.lines().collect();
        assert_eq!(lines[1], "| id | instructor | name | capacity |");
        assert_eq!(lines[3], "| 1  |            | Yoga |          |");
        assert_eq!(lines[4], "| 2  |            | Spin | 20       |");
        assert!(t.ends_with("rows: 2\n"));
    }

    #[test]
    fn non_lists_fall_back_to_json() {
        assert!(render_table(&json!({"id": 1})).is_none());
        assert!(render_table(&json!([])).is_none());
        assert_eq!(render_value(&json!({"id": 1}), false), "{\n  \"id\": 1\n}");
        assert!(render_value(&json!([1, 2]), true).starts_with('['));
        assert!(render_table_width(&json!([1, 2]), 80).unwrap().contains("| value |"));
    }

    #[test]
    fn long_cells_are_truncated_to_the_width() {
        let long = "x".repeat(100);
        let t = render_table_width(&json!([{ "id": 1, "note": long }]), 60).unwrap();
        assert!(t.lines().all(|l| l.chars().count() <= 60), "{}", t);
        assert!(t.contains('…'));
        assert!(t.contains("| id |"), "narrow columns are left alone: {}", t);

        let wide = render_table_width(&json!([{ "note": "x".repeat(100) }]), 200).unwrap();
        assert!(!wide.contains('…'));
    }

    #[test]
    fn columns_stop_shrinking_at_minimum() {
        let row = json!([{ "a": "aaaaaa", "b": "bbbbbb", "c": "cccccc" }]);
        let t = render_table_width(&row, 5).unwrap();
        assert_eq!(t.lines().next().unwrap(), "+-----+-----+-----+");
    }
}
