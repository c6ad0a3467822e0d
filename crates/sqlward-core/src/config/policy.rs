//! Statement policy toggles.
//!
//! Every toggle defaults to deny. `read_only` is evaluated before the
//! toggles whenever both apply to a statement.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Run every statement in a read-only transaction and block attempts to
    /// leave read-only mode (session resets, `transaction_read_only`
    /// changes, read-write transactions).
    pub read_only: bool,

    /// Allow `DROP` of any object.
    pub allow_drop: bool,

    /// Allow `TRUNCATE`.
    pub allow_truncate: bool,

    /// Allow anonymous `DO` code blocks.
    pub allow_do: bool,

    /// Allow `DELETE` with no `WHERE` clause.
    pub allow_delete_without_where: bool,

    /// Allow `UPDATE` with no `WHERE` clause.
    pub allow_update_without_where: bool,

    /// Allow `COPY ... FROM` (data import).
    pub allow_copy_from: bool,

    /// Allow `CREATE FUNCTION` and `CREATE PROCEDURE`.
    pub allow_create_function: bool,

    /// Allow `PREPARE`.
    pub allow_prepare: bool,

    /// Allow `RESET`, `DISCARD ALL` and `SET ... TO DEFAULT`.
    pub allow_reset: bool,
}

impl PolicyConfig {
    /// Names of the toggles that are switched on, in declaration order.
    pub fn enabled_toggles(&self) -> Vec<&'static str> {
        [
            ("allow_drop", self.allow_drop),
            ("allow_truncate", self.allow_truncate),
            ("allow_do", self.allow_do),
            ("allow_delete_without_where", self.allow_delete_without_where),
            ("allow_update_without_where", self.allow_update_without_where),
            ("allow_copy_from", self.allow_copy_from),
            ("allow_create_function", self.allow_create_function),
            ("allow_prepare", self.allow_prepare),
            ("allow_reset", self.allow_reset),
        ]
        .into_iter()
        .filter_map(|(name, on)| on.then_some(name))
        .collect()
    }
}
