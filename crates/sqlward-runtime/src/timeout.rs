//! Statement timeout selection.

use regex::Regex;
use sqlward_core::{ConfigError, TimeoutsConfig, compile_pattern};
use std::time::Duration;

/// Maps SQL text to an execution deadline. First matching rule wins.
#[derive(Debug, Clone)]
pub struct TimeoutSelector {
    rules: Vec<(Regex, Duration)>,
    default: Duration,
}

impl TimeoutSelector {
    pub fn new(default: Duration, rules: Vec<(Regex, Duration)>) -> Self {
        Self { rules, default }
    }

    pub fn from_config(config: &TimeoutsConfig) -> Result<Self, ConfigError> {
        let default = config.default.ok_or(ConfigError::MissingDefaultTimeout)?;
        let rules = config
            .rules
            .iter()
            .enumerate()
            .map(|(i, rule)| {
                compile_pattern(&format!("timeouts.rules[{i}].pattern"), &rule.pattern)
                    .map(|pattern| (pattern, rule.timeout))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(default, rules))
    }

    pub fn select(&self, sql: &str) -> Duration {
        self.rules
            .iter()
            .find(|(pattern, _)| pattern.is_match(sql))
            .map_or(self.default, |(_, timeout)| *timeout)
    }

    pub fn default_timeout(&self) -> Duration {
        self.default
    }
}
