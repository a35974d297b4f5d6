//! Target engine identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, Xsd2DbError};

/// Closed set of target engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// SQL Server, driven by a generated DDL script.
    Sql,
    /// File-based desktop catalog, driven through its native catalog API.
    Jet,
    /// Generic OLE DB provider. Recognized but not supported.
    OleDb,
}

impl EngineKind {
    pub fn name(&self) -> &'static str {
        match self {
            EngineKind::Sql => "sql",
            EngineKind::Jet => "jet",
            EngineKind::OleDb => "oledb",
        }
    }

    /// Server engines need a host to connect to.
    pub fn requires_location(&self) -> bool {
        matches!(self, EngineKind::Sql)
    }

    /// Fail unless an adapter exists for this engine.
    pub fn ensure_supported(&self) -> Result<()> {
        match self {
            EngineKind::OleDb => Err(Xsd2DbError::argument(
                "type",
                "The OleDb engine type is not supported",
            )),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EngineKind {
    type Err = Xsd2DbError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "sql" | "mssql" | "sqlserver" => Ok(EngineKind::Sql),
            "jet" | "access" => Ok(EngineKind::Jet),
            "oledb" | "ole" => Ok(EngineKind::OleDb),
            other => Err(Xsd2DbError::argument(
                "type",
                format!("unknown engine type '{}' (expected sql, jet or oledb)", other),
            )),
        }
    }
}
