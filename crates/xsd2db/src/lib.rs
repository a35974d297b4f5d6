//! # xsd2db
//!
//! Compile XML Schema (XSD) documents into relational databases.
//!
//! This library turns a relational schema model, loaded from an ADO.NET
//! DataSet-style XSD, into a live database with:
//!
//! - **Tables** with engine-native column types
//! - **Primary keys** in declared column order
//! - **Foreign keys** with cascading deletes
//! - **Idempotent reruns** guarded by existence checks
//! - **Per-entity isolation** so one bad table does not sink the rest
//!
//! Two engines are supported: SQL Server through generated DDL, and a
//! file-backed Jet catalog driven through catalog primitives.
//!
//! ## Example
//!
//! ```rust,no_run
//! use xsd2db::{Config, Orchestrator};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> xsd2db::Result<()> {
//!     let config = Config::load("xsd2db.yaml")?;
//!     let orchestrator = Orchestrator::new(config)?;
//!     let report = orchestrator.run().await?;
//!     println!("Created {} tables", report.tables_created);
//!     Ok(())
//! }
//! ```

pub mod compiler;
pub mod config;
pub mod core;
pub mod dialect;
pub mod drivers;
pub mod error;
pub mod loader;
pub mod orchestrator;

// Re-exports for convenient access
pub use compiler::{compile, Compilation, ScriptCompiler, Statement, StatementKind};
pub use config::{Config, TargetConfig};
pub use crate::core::{
    Column, ColumnType, CreateOptions, CreateReport, DatabaseStep, EngineKind, Relation,
    SchemaAdapter, Schema, Table,
};
pub use drivers::{AdapterImpl, JetAdapter, MssqlAdapter, MssqlDialect};
pub use error::{Result, Xsd2DbError};
pub use loader::load_schema;
pub use orchestrator::Orchestrator;
