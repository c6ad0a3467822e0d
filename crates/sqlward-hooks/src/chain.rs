//! Ordered, pattern-matched guardrail phases.

use regex::Regex;
use sqlward_core::{CallContext, ConfigError, GuardrailEntryConfig, GuardrailsConfig, compile_pattern};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::GuardrailError;
use crate::guardrail::{Guardrail, Phase};
use crate::process::ProcessGuardrail;

/// A guardrail with its trigger pattern and deadline.
#[derive(Clone)]
pub struct GuardrailEntry {
    pattern: Regex,
    guardrail: Arc<dyn Guardrail>,
    timeout: Duration,
}

impl GuardrailEntry {
    pub fn new(pattern: Regex, guardrail: Arc<dyn Guardrail>, timeout: Duration) -> Self {
        Self {
            pattern,
            guardrail,
            timeout,
        }
    }

    fn from_config(
        field: &str,
        config: &GuardrailEntryConfig,
        default_timeout: Option<Duration>,
    ) -> Result<Self, ConfigError> {
        let pattern = compile_pattern(&format!("{field}.pattern"), &config.pattern)?;
        let timeout = config
            .timeout
            .or(default_timeout)
            .ok_or_else(|| ConfigError::Invalid {
                field: format!("{field}.timeout"),
                reason: "no timeout set and guardrails.default_timeout is missing".to_string(),
            })?;
        let guardrail = ProcessGuardrail::new(
            config.display_name(),
            config.command.clone(),
            config.args.clone(),
        );
        Ok(Self::new(pattern, Arc::new(guardrail), timeout))
    }
}

impl std::fmt::Debug for GuardrailEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardrailEntry")
            .field("name", &self.guardrail.name())
            .field("pattern", &self.pattern.as_str())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// The before and after guardrail phases.
///
/// Built once at startup and shared read-only between calls.
#[derive(Debug, Clone, Default)]
pub struct GuardrailChain {
    before: Vec<GuardrailEntry>,
    after: Vec<GuardrailEntry>,
}

impl GuardrailChain {
    pub fn new(before: Vec<GuardrailEntry>, after: Vec<GuardrailEntry>) -> Self {
        Self { before, after }
    }

    /// Build process-backed entries from configuration.
    pub fn from_config(config: &GuardrailsConfig) -> Result<Self, ConfigError> {
        let build = |phase: &str, entries: &[GuardrailEntryConfig]| {
            entries
                .iter()
                .enumerate()
                .map(|(i, entry)| {
                    GuardrailEntry::from_config(
                        &format!("guardrails.{phase}[{i}]"),
                        entry,
                        config.default_timeout,
                    )
                })
                .collect::<Result<Vec<_>, _>>()
        };
        Ok(Self::new(
            build("before", &config.before)?,
            build("after", &config.after)?,
        ))
    }

    pub fn has_after_hooks(&self) -> bool {
        !self.after.is_empty()
    }

    /// Run the before phase on SQL text. Returns the possibly rewritten text.
    pub async fn run_before(
        &self,
        ctx: &CallContext,
        text: String,
    ) -> Result<String, GuardrailError> {
        run_phase(Phase::Before, &self.before, ctx, text).await
    }

    /// Run the after phase on a serialized result.
    pub async fn run_after(
        &self,
        ctx: &CallContext,
        text: String,
    ) -> Result<String, GuardrailError> {
        run_phase(Phase::After, &self.after, ctx, text).await
    }
}

async fn run_phase(
    phase: Phase,
    entries: &[GuardrailEntry],
    ctx: &CallContext,
    mut current: String,
) -> Result<String, GuardrailError> {
    for entry in entries {
        // Patterns see the payload as rewritten by earlier entries.
        if !entry.pattern.is_match(&current) {
            continue;
        }
        let name = entry.guardrail.name();
        debug!(guardrail = name, %phase, timeout = ?entry.timeout, "invoking guardrail");

        let entry_ctx = ctx.with_timeout(entry.timeout);
        let response = match entry.guardrail.invoke(&entry_ctx, &current).await {
            Ok(response) => response,
            Err(err) => {
                warn!(guardrail = name, %phase, error = %err, "guardrail failed");
                return Err(err);
            }
        };

        if !response.accept {
            let message = response
                .error_message
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| format!("rejected by guardrail {name}"));
            info!(guardrail = name, %phase, %message, "guardrail rejected payload");
            return Err(GuardrailError::Rejected {
                name: name.to_string(),
                message,
            });
        }

        if let Some(replacement) = response.replacement(phase) {
            debug!(guardrail = name, %phase, "guardrail rewrote payload");
            current = replacement.to_string();
        }
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guardrail::GuardrailResponse;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records what it saw and answers from a fixed function.
    struct Scripted {
        name: String,
        seen: Mutex<Vec<String>>,
        answer: fn(&str) -> GuardrailResponse,
    }

    impl Scripted {
        fn new(name: &str, answer: fn(&str) -> GuardrailResponse) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                seen: Mutex::new(Vec::new()),
                answer,
            })
        }

        fn seen(&self) -> Vec<String> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Guardrail for Scripted {
        fn name(&self) -> &str {
            &self.name
        }

        async fn invoke(
            &self,
            _ctx: &CallContext,
            payload: &str,
        ) -> Result<GuardrailResponse, GuardrailError> {
            self.seen.lock().unwrap().push(payload.to_string());
            Ok((self.answer)(payload))
        }
    }

    fn entry(pattern: &str, guardrail: Arc<Scripted>) -> GuardrailEntry {
        GuardrailEntry::new(Regex::new(pattern).unwrap(), guardrail, Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_second_hook_sees_rewritten_text() {
        let rewriter = Scripted::new("rewriter", |_| GuardrailResponse {
            accept: true,
            modified_query: Some("SELECT 2".to_string()),
            ..Default::default()
        });
        let inspector = Scripted::new("inspector", |_| GuardrailResponse::accepted());
        let chain = GuardrailChain::new(
            vec![entry(".*", rewriter.clone()), entry(".*", inspector.clone())],
            vec![],
        );

        let out = chain
            .run_before(&CallContext::new(), "SELECT 1".to_string())
            .await
            .unwrap();
        assert_eq!(out, "SELECT 2");
        assert_eq!(inspector.seen(), vec!["SELECT 2"]);
    }

    #[tokio::test]
    async fn test_rejection_stops_later_hooks() {
        let veto = Scripted::new("veto", |_| GuardrailResponse::rejected("nope"));
        let later = Scripted::new("later", |_| GuardrailResponse::accepted());
        let chain = GuardrailChain::new(
            vec![entry(".*", veto), entry(".*", later.clone())],
            vec![],
        );

        let err = chain
            .run_before(&CallContext::new(), "SELECT 1".to_string())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "nope");
        assert!(later.seen().is_empty());
    }

    #[tokio::test]
    async fn test_rejection_without_message_uses_fallback() {
        let veto = Scripted::new("quiet", |_| GuardrailResponse::default());
        let chain = GuardrailChain::new(vec![entry(".*", veto)], vec![]);
        let err = chain
            .run_before(&CallContext::new(), "x".to_string())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "rejected by guardrail quiet");
    }

    #[tokio::test]
    async fn test_pattern_is_matched_against_current_text() {
        let rewriter = Scripted::new("rewriter", |_| GuardrailResponse {
            accept: true,
            modified_query: Some("SELECT * FROM users".to_string()),
            ..Default::default()
        });
        let users_only = Scripted::new("users", |_| GuardrailResponse::accepted());
        let orders_only = Scripted::new("orders", |_| GuardrailResponse::accepted());
        let chain = GuardrailChain::new(
            vec![
                entry(".*", rewriter),
                entry("users", users_only.clone()),
                entry("orders", orders_only.clone()),
            ],
            vec![],
        );

        chain
            .run_before(&CallContext::new(), "SELECT * FROM orders".to_string())
            .await
            .unwrap();
        assert_eq!(users_only.seen().len(), 1);
        assert!(orders_only.seen().is_empty());
    }

    #[tokio::test]
    async fn test_after_phase_uses_modified_result() {
        let redactor = Scripted::new("redactor", |_| GuardrailResponse {
            accept: true,
            modified_query: Some("ignored".to_string()),
            modified_result: Some(r#"{"rows":[]}"#.to_string()),
            ..Default::default()
        });
        let chain = GuardrailChain::new(vec![], vec![entry(".*", redactor)]);
        assert!(chain.has_after_hooks());
        let out = chain
            .run_after(&CallContext::new(), r#"{"rows":[1]}"#.to_string())
            .await
            .unwrap();
        assert_eq!(out, r#"{"rows":[]}"#);
    }

    #[test]
    fn test_from_config_applies_default_timeout() {
        let config: GuardrailsConfig = parse_config(
            r#"{"default_timeout":"3s","before":[{"command":"/bin/true"}],"after":[]}"#,
        );
        let chain = GuardrailChain::from_config(&config).unwrap();
        assert_eq!(chain.before[0].timeout, Duration::from_secs(3));
        assert!(!chain.has_after_hooks());
    }

    fn parse_config(json: &str) -> GuardrailsConfig {
        serde_json::from_str(json).unwrap()
    }
}
