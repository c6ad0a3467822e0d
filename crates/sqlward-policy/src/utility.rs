//! Token-level checks for utility statements the parser has no AST for.
//!
//! `DO`, `RESET` and `DISCARD` never nest inside other statements, so
//! looking at the leading keywords of each semicolon-separated group is
//! enough to classify them. The tokenizer understands dollar quoting, so a
//! semicolon inside a `DO $$ ... $$` body does not split the group.

use crate::error::PolicyError;
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::tokenizer::{Token, Tokenizer};

/// A utility statement recognized from its leading keywords.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Utility {
    /// `DO $$ ... $$`
    AnonymousBlock,
    /// `RESET ALL`, `DISCARD ALL`
    ResetAll,
    /// `RESET <name>`
    Reset(String),
    /// `DISCARD PLANS | SEQUENCES | TEMP`
    Discard,
}

/// Split `sql` into statements and classify any utility statement.
///
/// Returns `None` when no group starts with a utility keyword, in which case
/// the caller parses normally. Otherwise returns the group count together
/// with the classification of the first utility statement found.
pub(crate) fn scan(
    dialect: &PostgreSqlDialect,
    sql: &str,
) -> Result<Option<(usize, Utility)>, PolicyError> {
    let tokens = Tokenizer::new(dialect, sql)
        .tokenize()
        .map_err(|e| PolicyError::ParseError(e.to_string()))?;

    let mut groups: Vec<Vec<String>> = Vec::new();
    let mut current: Vec<String> = Vec::new();
    for token in tokens {
        match token {
            Token::Whitespace(_) | Token::EOF => {}
            Token::SemiColon => {
                if !current.is_empty() {
                    groups.push(std::mem::take(&mut current));
                }
            }
            // Only the first two words of a group matter.
            Token::Word(word) if current.len() < 2 => current.push(word.value.to_ascii_uppercase()),
            other => {
                if current.len() < 2 {
                    current.push(other.to_string());
                }
            }
        }
    }
    if !current.is_empty() {
        groups.push(current);
    }

    let utility = groups.iter().find_map(|group| classify(group));
    Ok(utility.map(|u| (groups.len(), u)))
}

fn classify(group: &[String]) -> Option<Utility> {
    let second = group.get(1).map(String::as_str);
    match group.first().map(String::as_str)? {
        "DO" => Some(Utility::AnonymousBlock),
        "RESET" => match second {
            Some("ALL") => Some(Utility::ResetAll),
            Some(name) => Some(Utility::Reset(name.to_ascii_lowercase())),
            None => Some(Utility::Reset(String::new())),
        },
        "DISCARD" => match second {
            Some("ALL") => Some(Utility::ResetAll),
            _ => Some(Utility::Discard),
        },
        _ => None,
    }
}
