//! SQL identifier validation.
//!
//! DDL cannot bind identifiers as parameters, so every name that ends up in
//! statement text goes through [`Identifier::parse`] first.

use std::fmt;

use crate::errors::{AppError, AppResult};

/// Postgres truncates identifiers beyond `NAMEDATALEN - 1` bytes.
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// A name restricted to `[A-Za-z0-9_]`, 1 to 63 bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(String);

impl Identifier {
    /// Validates `raw` against the allow-list.
    ///
    /// # Errors
    /// Returns `AppError::InvalidIdentifier` for empty, over-long or
    /// out-of-alphabet names.
    pub fn parse(raw: &str) -> AppResult<Self> {
        if raw.is_empty() {
            return Err(AppError::InvalidIdentifier("identifier is empty".into()));
        }
        if raw.len() > MAX_IDENTIFIER_LEN {
            return Err(AppError::InvalidIdentifier(format!(
                "'{}' exceeds {} bytes",
                raw, MAX_IDENTIFIER_LEN
            )));
        }
        if let Some(bad) = raw.chars().find(|c| !(c.is_ascii_alphanumeric() || *c == '_')) {
            return Err(AppError::InvalidIdentifier(format!(
                "'{}' contains disallowed character {:?}",
                raw, bad
            )));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Double-quoted form for statement text; preserves case.
    pub fn quoted(&self) -> String {
        // The allow-list excludes '"', so no escaping is needed.
        format!("\"{}\"", self.0)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
