//! Operator hints attached to error text.

use regex::Regex;
use sqlward_core::{ConfigError, DiagnosticRule, compile_pattern};

#[derive(Debug, Clone, Default)]
pub struct DiagnosticMatcher {
    rules: Vec<(Regex, String)>,
}

impl DiagnosticMatcher {
    pub fn new(rules: Vec<(Regex, String)>) -> Self {
        Self { rules }
    }

    pub fn from_config(rules: &[DiagnosticRule]) -> Result<Self, ConfigError> {
        rules
            .iter()
            .enumerate()
            .map(|(i, rule)| {
                compile_pattern(&format!("diagnostics[{i}].pattern"), &rule.pattern)
                    .map(|pattern| (pattern, rule.message.clone()))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self::new)
    }

    /// Messages of every matching rule in declared order, one per line.
    /// Empty when nothing matches.
    pub fn matches(&self, error: &str) -> String {
        self.rules
            .iter()
            .filter(|(pattern, _)| pattern.is_match(error))
            .map(|(_, message)| message.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// `error` followed by any hints after a blank line.
    pub fn augment(&self, error: String) -> String {
        let hints = self.matches(&error);
        if hints.is_empty() {
            error
        } else {
            format!("{error}\n\n{hints}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher() -> DiagnosticMatcher {
        DiagnosticMatcher::new(vec![
            (Regex::new("does not exist").unwrap(), "Hint: call list_tables.".to_string()),
            (Regex::new("nothing").unwrap(), "never".to_string()),
            (Regex::new("relation").unwrap(), "Hint: check the schema.".to_string()),
        ])
    }

    #[test]
    fn test_all_matches_concatenate() {
        assert_eq!(
            matcher().matches(r#"relation "foo" does not exist"#),
            "Hint: call list_tables.\nHint: check the schema."
        );
    }

    #[test]
    fn test_no_match_leaves_error_alone() {
        assert_eq!(matcher().matches("syntax error"), "");
        assert_eq!(matcher().augment("syntax error".to_string()), "syntax error");
    }

    #[test]
    fn test_augment_appends_after_blank_line() {
        assert_eq!(
            matcher().augment("column does not exist".to_string()),
            "column does not exist\n\nHint: call list_tables."
        );
    }
}
