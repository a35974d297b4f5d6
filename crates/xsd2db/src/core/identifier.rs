//! Identifier sanitizing for each target engine.
//!
//! Identifiers in generated DDL cannot be passed as statement parameters, so
//! every table, column, key and database name goes through [`sanitize`]
//! before it is spliced into a statement or handed to a catalog API:
//!
//! - SQL Server: trim, truncate to 128 characters, wrap in brackets with
//!   `]` escaped as `]]`.
//! - Jet catalogs: trim, lowercase, replace spaces and hyphens with `_`,
//!   truncate to 64 characters. Names are bare, never delimited.
//!
//! Sanitizing is idempotent. An already bracketed SQL Server identifier is
//! unwrapped before processing, so `sanitize(sanitize(x)) == sanitize(x)`.
//!
//! Collisions are not detected: two long names sharing a 128 character
//! prefix sanitize to the same identifier.

use std::fmt;

use crate::core::engine::EngineKind;
use crate::error::{Result, Xsd2DbError};

/// Maximum identifier length on SQL Server, in characters.
pub const MSSQL_MAX_IDENTIFIER_LENGTH: usize = 128;

/// Maximum identifier length on Jet catalogs, in characters.
pub const JET_MAX_IDENTIFIER_LENGTH: usize = 64;

/// An identifier that is safe to use for its target engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SafeIdent {
    quoted: String,
    bare: String,
}

impl SafeIdent {
    /// Form to splice into DDL (delimited where the engine requires it).
    pub fn as_str(&self) -> &str {
        &self.quoted
    }

    /// Undelimited form, for catalog lookups and string literals.
    pub fn bare(&self) -> &str {
        &self.bare
    }
}

impl fmt::Display for SafeIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.quoted)
    }
}

impl AsRef<str> for SafeIdent {
    fn as_ref(&self) -> &str {
        &self.quoted
    }
}

/// Reject identifiers that cannot be made safe.
///
/// Rejects empty (or all-whitespace) names and names containing NUL.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Xsd2DbError::argument(
            format!("{:?}", name),
            "Identifier cannot be empty",
        ));
    }

    if name.contains('\0') {
        return Err(Xsd2DbError::argument(
            format!("{:?}", name),
            "Identifier contains a null byte",
        ));
    }

    Ok(())
}

/// Sanitize a name for the given engine.
pub fn sanitize(name: &str, engine: EngineKind) -> Result<SafeIdent> {
    match engine {
        EngineKind::Sql | EngineKind::OleDb => sanitize_mssql(name),
        EngineKind::Jet => sanitize_bare(name, JET_MAX_IDENTIFIER_LENGTH),
    }
}

/// Sanitize a SQL Server identifier into its bracketed form.
///
/// ```ignore
/// assert_eq!(sanitize_mssql(" users ")?.as_str(), "[users]");
/// assert_eq!(sanitize_mssql("table]name")?.as_str(), "[table]]name]");
/// assert_eq!(sanitize_mssql("[users]")?.as_str(), "[users]");
/// ```
pub fn sanitize_mssql(name: &str) -> Result<SafeIdent> {
    let trimmed = name.trim();
    let raw = unbracket(trimmed).unwrap_or_else(|| trimmed.to_string());
    validate_identifier(&raw)?;

    let bare = truncate(raw.trim(), MSSQL_MAX_IDENTIFIER_LENGTH);
    Ok(SafeIdent {
        quoted: format!("[{}]", bare.replace(']', "]]")),
        bare,
    })
}

/// Sanitize an identifier for engines that require bare names.
pub fn sanitize_bare(name: &str, max_length: usize) -> Result<SafeIdent> {
    validate_identifier(name)?;

    let substituted: String = name
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect();
    let bare = truncate(&substituted, max_length);

    Ok(SafeIdent {
        quoted: bare.clone(),
        bare,
    })
}

/// Escape a value for use inside an `N'...'` string literal.
pub fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}

fn truncate(name: &str, max_chars: usize) -> String {
    let truncated: String = name.chars().take(max_chars).collect();
    truncated.trim_end().to_string()
}

/// Undo bracket quoting if `name` is a well-formed bracketed identifier.
fn unbracket(name: &str) -> Option<String> {
    let inner = name.strip_prefix('[')?.strip_suffix(']')?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == ']' && chars.next() != Some(']') {
            return None;
        }
        out.push(c);
    }
    Some(out)
}
