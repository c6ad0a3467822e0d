//! Redaction of string values in result rows.

use regex::Regex;
use serde_json::Value;
use sqlward_core::{ConfigError, Row, SanitizeRule, compile_pattern};
use std::borrow::Cow;

/// Applies every replacement rule, in order, to every string in a row set.
///
/// Holds only compiled rules, so one instance is shared by all calls.
#[derive(Debug, Clone, Default)]
pub struct Sanitizer {
    rules: Vec<(Regex, String)>,
}

impl Sanitizer {
    pub fn new(rules: Vec<(Regex, String)>) -> Self {
        Self { rules }
    }

    pub fn from_config(rules: &[SanitizeRule]) -> Result<Self, ConfigError> {
        rules
            .iter()
            .enumerate()
            .map(|(i, rule)| {
                compile_pattern(&format!("sanitize[{i}].pattern"), &rule.pattern)
                    .map(|pattern| (pattern, rule.replacement.clone()))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self::new)
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn sanitize_rows(&self, rows: &mut [Row]) {
        if self.rules.is_empty() {
            return;
        }
        for row in rows {
            for value in row.values_mut() {
                self.sanitize_value(value);
            }
        }
    }

    /// Rewrite strings in place, recursing into arrays and objects.
    pub fn sanitize_value(&self, value: &mut Value) {
        match value {
            Value::String(text) => {
                for (pattern, replacement) in &self.rules {
                    if let Cow::Owned(replaced) = pattern.replace_all(text, replacement.as_str()) {
                        *text = replaced;
                    }
                }
            }
            Value::Array(items) => items.iter_mut().for_each(|item| self.sanitize_value(item)),
            Value::Object(map) => map.values_mut().for_each(|item| self.sanitize_value(item)),
            Value::Null | Value::Bool(_) | Value::Number(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sanitizer() -> Sanitizer {
        Sanitizer::new(vec![
            (Regex::new(r"\d{3}-\d{2}-\d{4}").unwrap(), "[SSN]".to_string()),
            (Regex::new(r"\[SSN\]").unwrap(), "[REDACTED]".to_string()),
            (Regex::new(r"(?P<user>\w+)@example\.com").unwrap(), "$user@***".to_string()),
        ])
    }

    #[test]
    fn test_rules_apply_in_order_and_accumulate() {
        let mut value = json!("ssn 123-45-6789");
        sanitizer().sanitize_value(&mut value);
        assert_eq!(value, json!("ssn [REDACTED]"));
    }

    #[test]
    fn test_recurses_into_nested_values() {
        let mut rows = vec![Row::from_iter([(
            "profile".to_string(),
            json!({"email": "bob@example.com", "tags": ["x", "alice@example.com"], "age": 42}),
        )])];
        sanitizer().sanitize_rows(&mut rows);
        assert_eq!(
            rows[0]["profile"],
            json!({"email": "bob@***", "tags": ["x", "alice@***"], "age": 42})
        );
    }

    #[test]
    fn test_non_strings_untouched() {
        let mut value = json!([1, true, null, 1234567890]);
        sanitizer().sanitize_value(&mut value);
        assert_eq!(value, json!([1, true, null, 1234567890]));
    }
}
