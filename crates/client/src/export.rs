//! CSV export of list views (RFC 4180 quoting).

use serde_json::Value;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Delimiter {
    #[default]
    Comma,
    /// Spreadsheet locales that use the comma as decimal separator.
    Semicolon,
}

impl Delimiter {
    pub fn as_char(self) -> char {
        match self {
            Self::Comma => ',',
            Self::Semicolon => ';',
        }
    }
}

impl FromStr for Delimiter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "," | "comma" => Ok(Self::Comma),
            ";" | "semicolon" => Ok(Self::Semicolon),
            other => Err(format!("unsupported delimiter: {other}")),
        }
    }
}

fn push_field(out: &mut String, field: &str, delimiter: char) {
    let needs_quotes = field.contains(delimiter) || field.contains(['"', '\r', '\n']);
    if needs_quotes {
        out.push('"');
        out.push_str(&field.replace('"', "\"\""));
        out.push('"');
    } else {
        out.push_str(field);
    }
}

fn push_record<S: AsRef<str>>(out: &mut String, fields: &[S], delimiter: char) {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(delimiter);
        }
        push_field(out, field.as_ref(), delimiter);
    }
    out.push_str("\r\n");
}

/// Header line plus one line per row, CRLF-terminated.
pub fn to_csv<S: AsRef<str>>(headers: &[&str], rows: &[Vec<S>], delimiter: Delimiter) -> String {
    let d = delimiter.as_char();
    let mut out = String::new();
    push_record(&mut out, headers, d);
    for row in rows {
        push_record(&mut out, row, d);
    }
    out
}

/// Text of a JSON cell: strings unquoted, null and missing empty.
pub fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Pick `columns` out of each JSON object.
pub fn json_rows(items: &[Value], columns: &[&str]) -> Vec<Vec<String>> {
    items
        .iter()
        .map(|item| columns.iter().map(|c| cell(item.get(*c))).collect())
        .collect()
}

pub const AD_COLUMNS: &[&str] = &["id", "title", "channel", "status", "target", "campaign_id", "scheduled_at", "created_at"];
pub const CONTACT_COLUMNS: &[&str] = &["id", "name", "email", "phone", "consent_at", "created_at"];
pub const DELIVERY_COLUMNS: &[&str] = &[
    "id",
    "campaign_id",
    "channel",
    "to_addr",
    "status",
    "attempts",
    "max_attempts",
    "next_attempt_at",
    "last_error",
    "created_at",
];
pub const APPOINTMENT_COLUMNS: &[&str] = &[
    "id",
    "customer_id",
    "vehicle_id",
    "title",
    "status",
    "scheduled_at",
    "duration_minutes",
    "reminded_at",
];

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn quotes_only_when_needed() {
        let rows = vec![
            vec!["1", "plain"],
            vec!["2", "has, comma"],
            vec!["3", "say \"hi\""],
            vec!["4", "two\nlines"],
        ];
        let csv = to_csv(&["id", "text"], &rows, Delimiter::Comma);
        assert_eq!(
            csv,
            "id,text\r\n1,plain\r\n2,\"has, comma\"\r\n3,\"say \"\"hi\"\"\"\r\n4,\"two\nlines\"\r\n"
        );
    }

    #[test]
    fn semicolon_delimiter() {
        let rows = vec![vec!["1,5", "a;b"]];
        let csv = to_csv(&["n", "t"], &rows, Delimiter::Semicolon);
        assert_eq!(csv, "n;t\r\n1,5;\"a;b\"\r\n");
        assert_eq!("semicolon".parse::<Delimiter>(), Ok(Delimiter::Semicolon));
        assert!("|".parse::<Delimiter>().is_err());
    }

    #[test]
    fn json_cells() {
        let items = vec![json!({ "id": 7, "name": "Ana", "email": null, "meta": { "vip": true } })];
        let rows = json_rows(&items, &["id", "name", "email", "phone", "meta"]);
        assert_eq!(rows, vec![vec!["7", "Ana", "", "", "{\"vip\":true}"]]);
    }
}
