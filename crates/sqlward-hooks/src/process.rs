//! Guardrails backed by an external executable.

use async_trait::async_trait;
use sqlward_core::{CallContext, Done};
use std::io::ErrorKind;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::error::GuardrailError;
use crate::guardrail::{Guardrail, GuardrailResponse};

/// Runs an executable with a fixed argument vector and feeds it the payload
/// on stdin. The command is never passed through a shell.
#[derive(Debug, Clone)]
pub struct ProcessGuardrail {
    name: String,
    command: String,
    args: Vec<String>,
}

impl ProcessGuardrail {
    pub fn new(name: impl Into<String>, command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args,
        }
    }
}

#[async_trait]
impl Guardrail for ProcessGuardrail {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(
        &self,
        ctx: &CallContext,
        payload: &str,
    ) -> Result<GuardrailResponse, GuardrailError> {
        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| GuardrailError::Spawn {
                name: self.name.clone(),
                source,
            })?;

        // Written from its own task so a hook that answers before reading
        // all of its input cannot deadlock against a full pipe.
        let writer = child.stdin.take().map(|mut stdin| {
            let input = payload.as_bytes().to_vec();
            let name = self.name.clone();
            tokio::spawn(async move {
                if let Err(err) = stdin.write_all(&input).await
                    && err.kind() != ErrorKind::BrokenPipe
                {
                    debug!(guardrail = %name, error = %err, "failed to write guardrail input");
                }
            })
        });

        // Dropping the wait future on expiry kills the child.
        let outcome = ctx.run(child.wait_with_output()).await;
        if let Some(writer) = writer {
            writer.abort();
        }
        let output = match outcome {
            Ok(result) => result.map_err(|source| GuardrailError::Io {
                name: self.name.clone(),
                source,
            })?,
            Err(Done::DeadlineExceeded) => {
                return Err(GuardrailError::Timeout {
                    name: self.name.clone(),
                });
            }
            Err(Done::Cancelled) => {
                return Err(GuardrailError::Cancelled {
                    name: self.name.clone(),
                });
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(GuardrailError::Failed {
                name: self.name.clone(),
                status: output.status,
                stderr: if stderr.is_empty() {
                    "no output".to_string()
                } else {
                    stderr
                },
            });
        }

        serde_json::from_slice(&output.stdout).map_err(|source| GuardrailError::InvalidResponse {
            name: self.name.clone(),
            source,
        })
    }
}
