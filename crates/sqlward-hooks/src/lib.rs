//! # sqlward-hooks
//!
//! Guardrails are external decision makers consulted before a statement is
//! checked and executed, and again on the serialized result. Each one may
//! accept, rewrite or veto the payload. Any failure to get a clear decision
//! (crash, non-zero exit, timeout, unparseable output) is treated exactly
//! like a veto.
//!
//! The [`GuardrailChain`] only depends on the [`Guardrail`] trait, so an
//! in-process implementation can replace [`ProcessGuardrail`] without
//! touching the pipeline.
//!
//! ## Process protocol
//!
//! The payload is written to the process's standard input. The process
//! answers with one JSON object on standard output:
//!
//! ```json
//! {"accept": true, "modified_query": "SELECT 1", "error_message": null}
//! ```
//!
//! After-phase hooks use `modified_result` instead of `modified_query`.

pub mod chain;
pub mod error;
pub mod guardrail;
pub mod process;

pub use chain::{GuardrailChain, GuardrailEntry};
pub use error::GuardrailError;
pub use guardrail::{Guardrail, GuardrailResponse, Phase};
pub use process::ProcessGuardrail;
