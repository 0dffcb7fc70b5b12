//! Template interpolation for runner configurations
//!
//! Handles `{{ name }}` placeholders. Substitution is literal: for each
//! variable, the four spacing variants `{{name}}`, `{{ name}}`, `{{name }}`
//! and `{{ name }}` are replaced in list order, so the first variable of a
//! given name wins. Names are free-form: anything but braces.
//!
//! Configurations are interpolated as a JSON tree: only string leaves (and
//! object keys) are rewritten, so a value containing quotes or braces cannot
//! break the structure of the configuration it lands in.

use crate::types::{JsonValue, Variable};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::LazyLock;

/// Regex for matching any remaining placeholder: {{ name }}
static PLACEHOLDER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([^{}]+?)\s*\}\}").expect("placeholder regex is valid")
});

/// Replace every placeholder of every variable in `template`
pub fn interpolate(template: &str, variables: &[Variable]) -> String {
    let mut result = template.to_string();

    for variable in variables {
        if !result.contains("{{") {
            break;
        }
        let name = &variable.name;
        for pattern in [
            format!("{{{{ {name} }}}}"),
            format!("{{{{ {name}}}}}"),
            format!("{{{{{name} }}}}"),
            format!("{{{{{name}}}}}"),
        ] {
            result = result.replace(&pattern, &variable.value);
        }
    }

    result
}

/// Interpolate all string values (and keys) in a JSON tree
pub fn interpolate_value(value: &JsonValue, variables: &[Variable]) -> JsonValue {
    match value {
        JsonValue::String(s) => {
            if s.contains("{{") {
                JsonValue::String(interpolate(s, variables))
            } else {
                value.clone()
            }
        }
        JsonValue::Object(map) => {
            let mut new_map = serde_json::Map::new();
            for (k, v) in map {
                let new_key = if k.contains("{{") {
                    interpolate(k, variables)
                } else {
                    k.clone()
                };
                new_map.insert(new_key, interpolate_value(v, variables));
            }
            JsonValue::Object(new_map)
        }
        JsonValue::Array(arr) => JsonValue::Array(
            arr.iter()
                .map(|v| interpolate_value(v, variables))
                .collect(),
        ),
        _ => value.clone(),
    }
}

/// Interpolate a typed configuration by round-tripping it through a JSON tree
pub fn interpolate_config<T>(config: &T, variables: &[Variable]) -> serde_json::Result<T>
where
    T: Serialize + DeserializeOwned,
{
    let tree = serde_json::to_value(config)?;
    serde_json::from_value(interpolate_value(&tree, variables))
}

/// Check if a string contains placeholders
pub fn has_placeholders(s: &str) -> bool {
    PLACEHOLDER_REGEX.is_match(s)
}

/// Extract all placeholder names from a string
pub fn placeholders(template: &str) -> Vec<String> {
    PLACEHOLDER_REGEX
        .captures_iter(template)
        .filter_map(|cap| cap.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Placeholder names still present anywhere in a JSON tree
pub fn unresolved_placeholders(value: &JsonValue) -> Vec<String> {
    let mut found = Vec::new();
    collect_placeholders(value, &mut found);
    found
}

fn collect_placeholders(value: &JsonValue, found: &mut Vec<String>) {
    match value {
        JsonValue::String(s) => {
            for name in placeholders(s) {
                if !found.contains(&name) {
                    found.push(name);
                }
            }
        }
        JsonValue::Object(map) => {
            for (k, v) in map {
                for name in placeholders(k) {
                    if !found.contains(&name) {
                        found.push(name);
                    }
                }
                collect_placeholders(v, found);
            }
        }
        JsonValue::Array(arr) => {
            for v in arr {
                collect_placeholders(v, found);
            }
        }
        _ => {}
    }
}
