//! Configuration type definitions.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::engine::EngineKind;
use crate::core::traits::CreateOptions;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Schema source file (.xsd, .json, .yaml).
    #[serde(default)]
    pub schema_file: Option<PathBuf>,

    /// Database name override. Defaults to the name embedded in the schema.
    #[serde(default)]
    pub database: Option<String>,

    /// Target engine configuration.
    pub target: TargetConfig,

    /// Create behavior.
    #[serde(default)]
    pub create: CreateOptions,
}

impl Config {
    /// Configuration for `engine` with every other setting defaulted.
    pub fn new(engine: EngineKind) -> Self {
        Self {
            schema_file: None,
            database: None,
            target: TargetConfig::new(engine),
            create: CreateOptions::default(),
        }
    }
}

/// Target engine configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Engine type: sql, jet or oledb.
    #[serde(rename = "type")]
    pub engine: EngineKind,

    /// Server host for sql; catalog directory for jet (default: current directory).
    #[serde(default)]
    pub location: Option<String>,

    /// Server port (default: 1433).
    #[serde(default = "default_mssql_port")]
    pub port: u16,

    /// Login name (sql only).
    #[serde(default)]
    pub user: String,

    /// Password (sql only). Never serialized.
    #[serde(default, skip_serializing)]
    pub password: String,

    /// Encrypt the connection (default: true).
    #[serde(default = "default_true")]
    pub encrypt: bool,

    /// Trust the server certificate without validation (default: false).
    #[serde(default)]
    pub trust_server_cert: bool,

    /// Connect timeout in seconds (default: 30).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl TargetConfig {
    pub fn new(engine: EngineKind) -> Self {
        Self {
            engine,
            location: None,
            port: default_mssql_port(),
            user: String::new(),
            password: String::new(),
            encrypt: true,
            trust_server_cert: false,
            connect_timeout_secs: default_connect_timeout(),
        }
    }

    /// Catalog directory for file-based engines.
    pub fn catalog_dir(&self) -> PathBuf {
        self.location
            .as_deref()
            .filter(|l| !l.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

impl fmt::Debug for TargetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetConfig")
            .field("engine", &self.engine)
            .field("location", &self.location)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("encrypt", &self.encrypt)
            .field("trust_server_cert", &self.trust_server_cert)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

fn default_mssql_port() -> u16 {
    1433
}

fn default_true() -> bool {
    true
}

fn default_connect_timeout() -> u64 {
    30
}
