//! Policy rejection errors.

use std::fmt;
use thiserror::Error;

/// Statement classes that are denied unless their toggle is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementClass {
    Drop,
    Truncate,
    AnonymousBlock,
    DeleteWithoutWhere,
    UpdateWithoutWhere,
    CopyFrom,
    CreateFunction,
    Prepare,
    Reset,
}

impl StatementClass {
    /// The policy toggle that allows this class.
    pub fn toggle(self) -> &'static str {
        match self {
            Self::Drop => "allow_drop",
            Self::Truncate => "allow_truncate",
            Self::AnonymousBlock => "allow_do",
            Self::DeleteWithoutWhere => "allow_delete_without_where",
            Self::UpdateWithoutWhere => "allow_update_without_where",
            Self::CopyFrom => "allow_copy_from",
            Self::CreateFunction => "allow_create_function",
            Self::Prepare => "allow_prepare",
            Self::Reset => "allow_reset",
        }
    }

    fn reason(self) -> &'static str {
        match self {
            Self::Drop => "dropping database objects is not allowed",
            Self::Truncate => "truncating tables is not allowed",
            Self::AnonymousBlock => "anonymous code blocks cannot be analyzed",
            Self::DeleteWithoutWhere => "DELETE without WHERE clause would remove every row",
            Self::UpdateWithoutWhere => "UPDATE without WHERE clause would modify every row",
            Self::CopyFrom => "importing data with COPY FROM is not allowed",
            Self::CreateFunction => "creating functions or procedures is not allowed",
            Self::Prepare => "creating prepared statements is not allowed",
            Self::Reset => "resetting session variables is not allowed",
        }
    }
}

impl fmt::Display for StatementClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Drop => "DROP",
            Self::Truncate => "TRUNCATE",
            Self::AnonymousBlock => "DO",
            Self::DeleteWithoutWhere => "DELETE",
            Self::UpdateWithoutWhere => "UPDATE",
            Self::CopyFrom => "COPY FROM",
            Self::CreateFunction => "CREATE FUNCTION",
            Self::Prepare => "PREPARE",
            Self::Reset => "RESET",
        };
        f.write_str(name)
    }
}

/// Reasons a statement is refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    /// SQL parsing failed.
    #[error("failed to parse SQL: {0}")]
    ParseError(String),

    /// The input contained no statement.
    #[error("no SQL statement found")]
    Empty,

    /// More than one top-level statement. Never configurable.
    #[error("only one statement is allowed per call, got {count} statements")]
    MultipleStatements { count: usize },

    /// A statement class denied by its toggle.
    #[error(
        "{class} blocked: {} (set policy.{} to allow)",
        .class.reason(),
        .class.toggle()
    )]
    Blocked { class: StatementClass },

    /// A statement that would leave read-only mode.
    #[error("{action} is not allowed in read-only mode")]
    ReadOnly { action: String },
}

impl PolicyError {
    pub(crate) fn blocked(class: StatementClass) -> Self {
        Self::Blocked { class }
    }

    pub(crate) fn read_only(action: impl Into<String>) -> Self {
        Self::ReadOnly {
            action: action.into(),
        }
    }
}
