//! The guardrail seam and its decision record.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlward_core::CallContext;
use std::fmt;

use crate::error::GuardrailError;

/// When a guardrail runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// On the SQL text, before the policy check.
    Before,
    /// On the serialized result, before commit.
    After,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Before => f.write_str("before"),
            Self::After => f.write_str("after"),
        }
    }
}

/// A guardrail's decision.
///
/// `accept` is mandatory: an object without it does not parse, and an
/// unparseable answer is a rejection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardrailResponse {
    pub accept: bool,

    /// Replacement SQL text (before phase).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_query: Option<String>,

    /// Replacement serialized result (after phase).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_result: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl GuardrailResponse {
    pub fn accepted() -> Self {
        Self {
            accept: true,
            ..Default::default()
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            accept: false,
            error_message: Some(message.into()),
            ..Default::default()
        }
    }

    /// The non-empty replacement payload for `phase`, if any.
    pub fn replacement(&self, phase: Phase) -> Option<&str> {
        let modified = match phase {
            Phase::Before => self.modified_query.as_deref(),
            Phase::After => self.modified_result.as_deref(),
        };
        modified.filter(|text| !text.is_empty())
    }
}

/// Something that decides whether a payload may proceed.
///
/// `ctx` carries the deadline for this invocation. Implementations must give
/// up and return [`GuardrailError::Timeout`] or [`GuardrailError::Cancelled`]
/// once it is done.
#[async_trait]
pub trait Guardrail: Send + Sync {
    fn name(&self) -> &str;

    async fn invoke(
        &self,
        ctx: &CallContext,
        payload: &str,
    ) -> Result<GuardrailResponse, GuardrailError>;
}
