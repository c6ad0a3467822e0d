//! # sqlward-policy
//!
//! AST-level allow/deny rules for a single SQL statement.
//!
//! The engine parses the input with the `sqlparser` PostgreSQL dialect,
//! refuses anything other than exactly one top-level statement, then walks
//! the statement recursively. Common table expressions, `EXPLAIN` targets,
//! `PREPARE` bodies and `COPY (query)` sources are checked with the same
//! rules as top-level statements, so nesting a data-modifying statement
//! never bypasses a rule.
//!
//! | Statement | Rule |
//! |-----------|------|
//! | `DROP ...` | `allow_drop` |
//! | `TRUNCATE` | `allow_truncate` |
//! | `DO $$ ... $$` | `allow_do` |
//! | `DELETE` without `WHERE` | `allow_delete_without_where` |
//! | `UPDATE` without `WHERE` | `allow_update_without_where` |
//! | `COPY ... FROM` | `allow_copy_from` |
//! | `CREATE FUNCTION` / `CREATE PROCEDURE` | `allow_create_function` |
//! | `PREPARE` | `allow_prepare` |
//! | `RESET`, `DISCARD ALL`, `SET ... TO DEFAULT` | `allow_reset` |
//!
//! With `read_only` set, `RESET ALL`, `DISCARD ALL`, any change to
//! `transaction_read_only` and read-write transaction modes are refused
//! before the toggles are consulted.

pub mod engine;
pub mod error;
mod utility;

pub use engine::PolicyEngine;
pub use error::{PolicyError, StatementClass};
