use std::collections::BTreeMap;

use serde_json::Value;

use crate::basket::reporter::Table;
use crate::basket::BASKETS_INFO_TABLE;

/// Escape text for HTML element content and attribute values
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn format_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => escape(s),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() != 0.0 => format!("{:.6}", f)
                .trim_end_matches('0')
                .trim_end_matches('.')
                .to_string(),
            _ => n.to_string(),
        },
        Value::Array(items) => items
            .iter()
            .map(format_cell)
            .collect::<Vec<_>>()
            .join("<br>"),
        other => escape(&other.to_string()),
    }
}

/// Column names in first-seen order across all rows
fn columns(table: &Table) -> Vec<String> {
    let mut cols: Vec<String> = Vec::new();
    for row in table.values() {
        if let Value::Object(map) = row {
            for key in map.keys() {
                if !cols.iter().any(|c| c == key) {
                    cols.push(key.clone());
                }
            }
        }
    }
    cols
}

fn render_table(name: &str, table: &Table) -> String {
    let cols = columns(table);
    let header: String = cols
        .iter()
        .map(|c| format!("<th>{}</th>", escape(c)))
        .collect();

    let body: String = table
        .values()
        .map(|row| {
            let cells: String = cols
                .iter()
                .map(|c| {
                    let value = row.get(c).unwrap_or(&Value::Null);
                    let class = match value.as_str() {
                        Some(s) if s.starts_with("🔴") => " class=\"red\"",
                        Some(s) if s.starts_with("🟢") => " class=\"green\"",
                        _ => "",
                    };
                    format!("<td{}>{}</td>", class, format_cell(value))
                })
                .collect();
            format!("<tr>{}</tr>", cells)
        })
        .collect();

    format!(
        r#"<section class="card">
        <h2>{name} <span class="count">{count}</span></h2>
        <table><thead><tr>{header}</tr></thead><tbody>{body}</tbody></table>
    </section>"#,
        name = escape(name),
        count = table.len(),
        header = header,
        body = body,
    )
}

/// Render every report table as an auto-refreshing HTML page. The basket
/// status table comes first.
pub fn render_dashboard(tables: &BTreeMap<String, Table>) -> String {
    let mut sections = String::new();
    if let Some(table) = tables.get(BASKETS_INFO_TABLE) {
        sections.push_str(&render_table(BASKETS_INFO_TABLE, table));
    }
    for (name, table) in tables.iter().filter(|(name, _)| name.as_str() != BASKETS_INFO_TABLE) {
        sections.push_str(&render_table(name, table));
    }
    if sections.is_empty() {
        sections.push_str(r#"<p class="empty">Waiting for the first basket report...</p>"#);
    }

    format!(
        r##"<!DOCTYPE html>
<html>
<head>
    <title>Grid Baskets</title>
    <meta http-equiv="refresh" content="5">
    <style>
        :root {{
            --bg-primary: #0a0a0f;
            --bg-card: #1a1a24;
            --border: #2a2a3a;
            --text-primary: #ffffff;
            --text-secondary: #8888a0;
            --green: #00d4aa;
            --red: #ff4d6a;
        }}
        * {{ margin: 0; padding: 0; box-sizing: border-box; }}
        body {{
            font-family: -apple-system, sans-serif;
            background: var(--bg-primary);
            color: var(--text-primary);
            padding: 24px;
        }}
        h1 {{ font-size: 20px; margin-bottom: 16px; }}
        h2 {{ font-size: 15px; margin-bottom: 12px; color: var(--text-secondary); }}
        .count {{ font-size: 12px; border: 1px solid var(--border); border-radius: 8px; padding: 1px 6px; }}
        .card {{
            background: var(--bg-card);
            border: 1px solid var(--border);
            border-radius: 10px;
            padding: 16px;
            margin-bottom: 20px;
            overflow-x: auto;
        }}
        table {{ border-collapse: collapse; width: 100%; font-family: monospace; font-size: 13px; }}
        th, td {{ text-align: left; padding: 6px 10px; border-bottom: 1px solid var(--border); white-space: nowrap; }}
        th {{ color: var(--text-secondary); font-weight: 500; }}
        .green {{ color: var(--green); }}
        .red {{ color: var(--red); }}
        .empty {{ color: var(--text-secondary); }}
    </style>
</head>
<body>
    <h1>Grid Baskets</h1>
    {sections}
</body>
</html>"##,
        sections = sections
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_status_first_and_escaped() {
        let mut tables = BTreeMap::new();
        let mut info = Table::new();
        info.insert(
            "ADA".into(),
            json!({"symbol": "ADA/USDT:USDT", "status": "🔴 Error", "errors": ["<boom>"]}),
        );
        tables.insert(BASKETS_INFO_TABLE.to_string(), info);
        let mut grid = Table::new();
        grid.insert("1".into(), json!({"_id": "1", "price": 0.5}));
        tables.insert("Grid Size Info".to_string(), grid);

        let html = render_dashboard(&tables);
        let status_pos = html.find("Baskets Info").unwrap();
        let grid_pos = html.find("Grid Size Info").unwrap();
        assert!(status_pos < grid_pos);
        assert!(html.contains("&lt;boom&gt;"));
        assert!(html.contains("class=\"red\""));
    }

    #[test]
    fn test_render_empty() {
        let html = render_dashboard(&BTreeMap::new());
        assert!(html.contains("Waiting for the first basket report"));
    }

    #[test]
    fn test_format_numbers() {
        assert_eq!(format_cell(&json!(1.5)), "1.5");
        assert_eq!(format_cell(&json!(3)), "3");
        assert_eq!(format_cell(&json!(0.123456789)), "0.123457");
    }
}
