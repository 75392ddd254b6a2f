//! Plain-text column tables for terminal views.

use serde_json::Value;

use crate::export::cell;

/// Left-aligned columns separated by two spaces; the last column is not
/// padded. Cells are cut at the first line break.
pub fn text_table<S: AsRef<str>>(headers: &[&str], rows: &[Vec<S>]) -> String {
    let first_line = |s: &str| s.lines().next().unwrap_or("").to_string();
    let rows: Vec<Vec<String>> = rows
        .iter()
        .map(|row| row.iter().map(|c| first_line(c.as_ref())).collect())
        .collect();

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in &rows {
        for (w, c) in widths.iter_mut().zip(row) {
            *w = (*w).max(c.chars().count());
        }
    }

    let mut out = String::new();
    let mut push_line = |cells: Vec<&str>| {
        let last = cells.len().saturating_sub(1);
        let line: Vec<String> = cells
            .iter()
            .enumerate()
            .map(|(i, c)| if i == last { c.to_string() } else { format!("{c:<w$}", w = widths[i]) })
            .collect();
        out.push_str(line.join("  ").trim_end());
        out.push('\n');
    };
    push_line(headers.to_vec());
    for row in &rows {
        push_line(row.iter().map(String::as_str).collect());
    }
    out
}

/// `(limit key, usage key, label)` for every metered resource.
const PLAN_RESOURCES: &[(&str, &str, &str)] = &[
    ("ads_created_monthly", "ads_created", "ads / month"),
    ("templates_created_monthly", "templates_created", "templates / month"),
    ("links_created_monthly", "links_created", "links / month"),
    ("invites_created_monthly", "invites_created", "invites / month"),
    ("sends_daily_total", "sends_total", "sends / day"),
];

/// Resource, used and limit rows of a plan snapshot. A null limit reads
/// `unlimited`.
pub fn plan_usage_rows(plan: &Value) -> Vec<Vec<String>> {
    PLAN_RESOURCES
        .iter()
        .map(|(limit, usage, label)| {
            let limit = match plan.pointer(&format!("/limits/{limit}")) {
                None | Some(Value::Null) => "unlimited".to_string(),
                other => cell(other),
            };
            let used = plan
                .pointer(&format!("/usage/{usage}"))
                .map_or_else(|| "0".to_string(), |v| cell(Some(v)));
            vec![label.to_string(), used, limit]
        })
        .collect()
}
