//! The policy engine: parse, count, then walk.

use crate::error::{PolicyError, StatementClass};
use crate::utility::{self, Utility};
use sqlparser::ast::{
    CopySource, Expr, Query, Set, SetExpr, Statement, TransactionAccessMode, TransactionMode,
};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use sqlward_core::PolicyConfig;
use tracing::debug;

/// Session variables that control the transaction access mode.
const READ_ONLY_VARIABLES: &[&str] = &["transaction_read_only", "default_transaction_read_only"];

/// Validates single SQL statements against a [`PolicyConfig`].
///
/// The engine holds no per-call state and can be shared across tasks.
#[derive(Debug)]
pub struct PolicyEngine {
    config: PolicyConfig,
    dialect: PostgreSqlDialect,
}

impl Clone for PolicyEngine {
    fn clone(&self) -> Self {
        Self::new(self.config.clone())
    }
}

impl Default for PolicyEngine {
    fn default() -> Self {
        Self::new(PolicyConfig::default())
    }
}

impl PolicyEngine {
    pub fn new(config: PolicyConfig) -> Self {
        Self {
            config,
            dialect: PostgreSqlDialect {},
        }
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    /// Check one SQL string.
    ///
    /// Fails with [`PolicyError::MultipleStatements`] whenever the input holds
    /// more than one statement, whatever the configuration says.
    pub fn check(&self, sql: &str) -> Result<(), PolicyError> {
        let result = self.check_inner(sql);
        if let Err(err) = &result {
            debug!(error = %err, "statement rejected by policy");
        }
        result
    }

    fn check_inner(&self, sql: &str) -> Result<(), PolicyError> {
        if let Some((count, utility)) = utility::scan(&self.dialect, sql)? {
            if count > 1 {
                return Err(PolicyError::MultipleStatements { count });
            }
            return self.check_utility(&utility);
        }

        let statements = Parser::parse_sql(&self.dialect, sql)
            .map_err(|e| PolicyError::ParseError(e.to_string()))?;
        match statements.as_slice() {
            [] => Err(PolicyError::Empty),
            [statement] => self.check_statement(statement),
            _ => Err(PolicyError::MultipleStatements {
                count: statements.len(),
            }),
        }
    }

    fn check_utility(&self, utility: &Utility) -> Result<(), PolicyError> {
        match utility {
            Utility::AnonymousBlock => self.require(StatementClass::AnonymousBlock),
            Utility::ResetAll => {
                if self.config.read_only {
                    return Err(PolicyError::read_only("resetting all session variables"));
                }
                self.require(StatementClass::Reset)
            }
            Utility::Reset(name) => {
                if self.config.read_only && READ_ONLY_VARIABLES.contains(&name.as_str()) {
                    return Err(PolicyError::read_only(format!("resetting {name}")));
                }
                self.require(StatementClass::Reset)
            }
            Utility::Discard => Ok(()),
        }
    }

    fn check_statement(&self, statement: &Statement) -> Result<(), PolicyError> {
        match statement {
            Statement::Query(query) => self.check_query(query),
            Statement::Insert(insert) => match &insert.source {
                Some(source) => self.check_query(source),
                None => Ok(()),
            },
            Statement::Update(update) => {
                if update.selection.is_none() {
                    self.require(StatementClass::UpdateWithoutWhere)?;
                }
                Ok(())
            }
            Statement::Delete(delete) => {
                if delete.selection.is_none() {
                    self.require(StatementClass::DeleteWithoutWhere)?;
                }
                Ok(())
            }
            // EXPLAIN ANALYZE runs its target, so the target gets the same rules.
            Statement::Explain { statement, .. } => self.check_statement(statement),
            Statement::Prepare { statement, .. } => {
                self.require(StatementClass::Prepare)?;
                self.check_statement(statement)
            }
            Statement::Copy { source, to, .. } => {
                if let CopySource::Query(query) = source {
                    self.check_query(query)?;
                }
                if !*to {
                    self.require(StatementClass::CopyFrom)?;
                }
                Ok(())
            }
            Statement::Drop { .. }
            | Statement::DropFunction(_)
            | Statement::DropProcedure { .. }
            | Statement::DropDomain(_)
            | Statement::DropTrigger(_)
            | Statement::DropPolicy { .. }
            | Statement::DropExtension(_)
            | Statement::DropOperator(_)
            | Statement::DropOperatorFamily(_)
            | Statement::DropOperatorClass(_)
            | Statement::DropSecret { .. }
            | Statement::DropConnector { .. } => self.require(StatementClass::Drop),
            Statement::Truncate { .. } => self.require(StatementClass::Truncate),
            Statement::CreateFunction { .. } | Statement::CreateProcedure { .. } => {
                self.require(StatementClass::CreateFunction)
            }
            Statement::Set(set) => self.check_set(set),
            Statement::StartTransaction { modes, .. } => {
                self.check_transaction_modes(modes, "starting a read-write transaction")
            }
            _ => Ok(()),
        }
    }

    fn check_query(&self, query: &Query) -> Result<(), PolicyError> {
        if let Some(with) = &query.with {
            for cte in &with.cte_tables {
                self.check_query(&cte.query)?;
            }
        }
        self.check_set_expr(&query.body)
    }

    fn check_set_expr(&self, body: &SetExpr) -> Result<(), PolicyError> {
        match body {
            SetExpr::Query(query) => self.check_query(query),
            SetExpr::SetOperation { left, right, .. } => {
                self.check_set_expr(left)?;
                self.check_set_expr(right)
            }
            SetExpr::Insert(statement) | SetExpr::Update(statement) | SetExpr::Delete(statement) => {
                self.check_statement(statement)
            }
            _ => Ok(()),
        }
    }

    fn check_set(&self, set: &Set) -> Result<(), PolicyError> {
        match set {
            Set::SingleAssignment {
                variable, values, ..
            } => {
                let name = variable_name(&variable.to_string());
                if self.config.read_only && READ_ONLY_VARIABLES.contains(&name.as_str()) {
                    return Err(PolicyError::read_only(format!("setting {name}")));
                }
                if matches!(values.as_slice(), [value] if is_default(value)) {
                    self.require(StatementClass::Reset)?;
                }
                Ok(())
            }
            Set::SetTransaction { modes, .. } => {
                self.check_transaction_modes(modes, "switching the transaction to read-write")
            }
            _ => Ok(()),
        }
    }

    fn check_transaction_modes(
        &self,
        modes: &[TransactionMode],
        action: &str,
    ) -> Result<(), PolicyError> {
        let read_write = modes.iter().any(|mode| {
            matches!(
                mode,
                TransactionMode::AccessMode(TransactionAccessMode::ReadWrite)
            )
        });
        if self.config.read_only && read_write {
            return Err(PolicyError::read_only(action));
        }
        Ok(())
    }

    fn require(&self, class: StatementClass) -> Result<(), PolicyError> {
        let allowed = match class {
            StatementClass::Drop => self.config.allow_drop,
            StatementClass::Truncate => self.config.allow_truncate,
            StatementClass::AnonymousBlock => self.config.allow_do,
            StatementClass::DeleteWithoutWhere => self.config.allow_delete_without_where,
            StatementClass::UpdateWithoutWhere => self.config.allow_update_without_where,
            StatementClass::CopyFrom => self.config.allow_copy_from,
            StatementClass::CreateFunction => self.config.allow_create_function,
            StatementClass::Prepare => self.config.allow_prepare,
            StatementClass::Reset => self.config.allow_reset,
        };
        if allowed {
            Ok(())
        } else {
            Err(PolicyError::blocked(class))
        }
    }
}

/// Last path segment of a variable name, unquoted and lowercased.
fn variable_name(raw: &str) -> String {
    let last = raw.rsplit('.').next().unwrap_or(raw);
    last.trim_matches('"').to_ascii_lowercase()
}

fn is_default(value: &Expr) -> bool {
    value.to_string().eq_ignore_ascii_case("DEFAULT")
}
