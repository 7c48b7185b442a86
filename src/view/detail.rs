use crate::thing::{FeatureValue, Thing};
use serde::Serialize;
use serde_json::Value;
use std::fmt::Write;

/// One line of a rendered feature tree
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DetailLine {
    pub depth: usize,
    pub text: String,
}

/// Text detail view of the selected thing
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DetailCard {
    pub title: String,
    pub attributes: Vec<(String, String)>,
    pub features: Vec<(String, Vec<DetailLine>)>,
}

impl DetailCard {
    pub fn for_thing(thing: &Thing) -> Self {
        Self {
            title: thing
                .model()
                .filter(|m| !m.is_empty())
                .unwrap_or("Unknown")
                .to_string(),
            attributes: thing
                .attributes
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            features: thing
                .parsed_features()
                .map(|(key, value)| (key.to_string(), feature_lines(&value)))
                .collect(),
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.title);
        let _ = writeln!(out, "Attributes:");
        for (key, value) in &self.attributes {
            let _ = writeln!(out, "  {}: {}", key, value);
        }
        let _ = writeln!(out, "Features:");
        for (key, lines) in &self.features {
            let _ = writeln!(out, "  {}:", key);
            for line in lines {
                let _ = writeln!(out, "{}{}", "  ".repeat(line.depth + 2), line.text);
            }
        }
        out
    }
}

fn feature_lines(value: &FeatureValue) -> Vec<DetailLine> {
    let mut lines = Vec::new();
    match value {
        FeatureValue::Raw(text) => lines.push(DetailLine {
            depth: 0,
            text: text.clone(),
        }),
        FeatureValue::Structured(value) => value_lines(value, 0, &mut lines),
    }
    lines
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some("null".to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        Value::Array(_) | Value::Object(_) => None,
    }
}

fn value_lines(value: &Value, depth: usize, out: &mut Vec<DetailLine>) {
    match value {
        Value::Array(items) => {
            for item in items {
                match scalar_text(item) {
                    Some(text) => out.push(DetailLine {
                        depth,
                        text: format!("- {}", text),
                    }),
                    None => {
                        out.push(DetailLine {
                            depth,
                            text: "-".to_string(),
                        });
                        value_lines(item, depth + 1, out);
                    }
                }
            }
        }
        Value::Object(obj) => {
            // Ditto features wrap their data in `properties`; skip that level
            let children = match obj.get("properties") {
                Some(Value::Object(props)) => props,
                _ => obj,
            };
            for (key, child) in children {
                match scalar_text(child) {
                    Some(text) => out.push(DetailLine {
                        depth,
                        text: format!("{}: {}", key, text),
                    }),
                    None => {
                        out.push(DetailLine {
                            depth,
                            text: format!("{}:", key),
                        });
                        value_lines(child, depth + 1, out);
                    }
                }
            }
        }
        scalar => {
            if let Some(text) = scalar_text(scalar) {
                out.push(DetailLine { depth, text });
            }
        }
    }
}
