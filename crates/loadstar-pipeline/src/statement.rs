//! SQL statements with secret redaction.
//!
//! A [`Statement`] carries the literal text sent to the warehouse plus the
//! secret values embedded in it. Its `Display` output masks those secrets, so
//! logging a statement with `%stmt` never leaks credentials.

use std::fmt;

/// Replacement text for redacted secrets.
pub const REDACTED: &str = "****";

/// A single SQL statement.
#[derive(Clone, PartialEq, Eq)]
pub struct Statement {
    sql: String,
    secrets: Vec<String>,
}

impl Statement {
    /// A statement with no embedded secrets.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            secrets: Vec::new(),
        }
    }

    /// Mark a value embedded in the statement as secret.
    ///
    /// Empty values are ignored.
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        let secret = secret.into();
        if !secret.is_empty() {
            self.secrets.push(secret);
        }
        self
    }

    /// The literal SQL text, secrets included.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Whether any secrets are embedded.
    pub fn has_secrets(&self) -> bool {
        !self.secrets.is_empty()
    }

    /// The SQL text with every secret replaced by [`REDACTED`].
    pub fn redacted(&self) -> String {
        // Longest first so a secret that contains another is masked whole.
        let mut secrets: Vec<&str> = self.secrets.iter().map(String::as_str).collect();
        secrets.sort_by_key(|s| std::cmp::Reverse(s.len()));

        let mut text = self.sql.clone();
        for secret in secrets {
            text = text.replace(secret, REDACTED);
        }
        text
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}

impl fmt::Debug for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Statement")
            .field("sql", &self.redacted())
            .field("secrets", &self.secrets.len())
            .finish()
    }
}

/// Quote a value as a single-quoted SQL string literal.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_statement_displays_verbatim() {
        let stmt = Statement::new("DELETE FROM staging_events");
        assert_eq!(stmt.sql(), "DELETE FROM staging_events");
        assert_eq!(stmt.to_string(), "DELETE FROM staging_events");
        assert!(!stmt.has_secrets());
    }

    #[test]
    fn test_secret_masked_in_display() {
        let stmt = Statement::new("COPY t SECRET_ACCESS_KEY 'SK123'").with_secret("SK123");
        assert!(stmt.sql().contains("SK123"));
        assert_eq!(stmt.to_string(), "COPY t SECRET_ACCESS_KEY '****'");
    }

    #[test]
    fn test_debug_does_not_leak() {
        let stmt = Statement::new("x 'hunter2'").with_secret("hunter2");
        let debug = format!("{:?}", stmt);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("secrets: 1"));
    }

    #[test]
    fn test_overlapping_secrets_masked_whole() {
        let stmt = Statement::new("a 'abc' b 'abcdef'")
            .with_secret("abc")
            .with_secret("abcdef");
        assert_eq!(stmt.redacted(), "a '****' b '****'");
    }

    #[test]
    fn test_empty_secret_ignored() {
        let stmt = Statement::new("SELECT 1").with_secret("");
        assert!(!stmt.has_secrets());
        assert_eq!(stmt.redacted(), "SELECT 1");
    }

    #[test]
    fn test_quote_literal_escapes() {
        assert_eq!(quote_literal("plain"), "'plain'");
        assert_eq!(quote_literal("it's"), "'it''s'");
    }
}
