//! Errors from the execution pipeline.

use sqlward_hooks::GuardrailError;
use sqlward_policy::PolicyError;
use std::time::Duration;
use thiserror::Error;

use crate::admission::AdmissionError;

/// Everything that can stop a call.
///
/// [`Pipeline::execute`](crate::Pipeline::execute) renders these into
/// `QueryResult.error`; catalog calls return them.
#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error(transparent)]
    Admission(#[from] AdmissionError),

    #[error(transparent)]
    Guardrail(#[from] GuardrailError),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    /// The database refused or failed the statement.
    #[error("{0:#}")]
    Database(anyhow::Error),

    #[error("statement timed out after {0:?}")]
    Timeout(Duration),

    #[error("call cancelled")]
    Cancelled,

    /// Serialization and other failures inside the pipeline itself.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for ExecuteError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(err.to_string())
    }
}
