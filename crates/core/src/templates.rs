//! Message template rendering: `{{variable}}` substitution for ad bodies
//! and reusable templates.

use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Template variables keyed by placeholder name.
pub type Variables = BTreeMap<String, String>;

fn placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{([a-zA-Z0-9_]+)\}\}").expect("static placeholder pattern"))
}

/// Replace every `{{name}}` with its value. Unknown names render empty;
/// anything that is not a well-formed placeholder is left as is.
pub fn render_template(text: &str, variables: &Variables) -> String {
    placeholder()
        .replace_all(text, |caps: &Captures<'_>| {
            variables.get(&caps[1]).cloned().unwrap_or_default()
        })
        .into_owned()
}

/// Flatten JSON variables: strings pass through, `null` renders empty,
/// everything else renders as its JSON text.
pub fn variables_from_json(values: &BTreeMap<String, serde_json::Value>) -> Variables {
    values
        .iter()
        .map(|(k, v)| {
            let text = match v {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Null => String::new(),
                other => other.to_string(),
            };
            (k.clone(), text)
        })
        .collect()
}

/// Names referenced by a template, in first-seen order.
pub fn placeholders(text: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for caps in placeholder().captures_iter(text) {
        let name = caps[1].to_string();
        if !seen.contains(&name) {
            seen.push(name);
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Variables {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn substitutes_known_and_blanks_unknown() {
        let out = render_template("Oi {{nome}}, {{oferta}}!", &vars(&[("nome", "Ana")]));
        assert_eq!(out, "Oi Ana, !");
    }

    #[test]
    fn leaves_malformed_placeholders() {
        let v = vars(&[("a", "1")]);
        assert_eq!(render_template("{{ a }} {a} {{a-b}} {{a}}", &v), "{{ a }} {a} {{a-b}} 1");
    }

    #[test]
    fn json_values_render_as_text() {
        let raw: BTreeMap<String, serde_json::Value> =
            serde_json::from_str(r#"{"n": 3, "ok": true, "s": "x", "z": null}"#).unwrap();
        let v = variables_from_json(&raw);
        assert_eq!(render_template("{{n}}-{{ok}}-{{s}}-{{z}}", &v), "3-true-x-");
    }

    #[test]
    fn lists_placeholders_once() {
        assert_eq!(placeholders("{{x}} {{y}} {{x}}"), vec!["x", "y"]);
    }
}
