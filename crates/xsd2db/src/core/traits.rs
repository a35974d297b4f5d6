//! Core traits for engine-agnostic schema creation.
//!
//! - [`Dialect`]: identifier sanitizing and type mapping for one engine
//! - [`DdlDialect`]: DDL text generation for engines driven by scripts
//! - [`SchemaAdapter`]: creates a database and its schema on an engine
//!
//! # Design Patterns
//!
//! - **Strategy**: dialects provide interchangeable sanitizing, mapping and DDL rules
//! - **Template Method**: [`Dialect::map_column`] builds on the engine's `map_type`

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, Xsd2DbError};

use super::engine::EngineKind;
use super::identifier::SafeIdent;
use super::schema::{Column, ColumnType, Schema, Table};

/// Native catalog data types, as understood by catalog-manipulation APIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NativeDataType {
    BigInt,
    UnsignedBigInt,
    Integer,
    UnsignedInt,
    SmallInt,
    UnsignedSmallInt,
    TinyInt,
    Boolean,
    WChar,
    Date,
    DbTime,
    Double,
    Decimal,
    Guid,
    LongVarWChar,
    LongVarBinary,
}

/// A column type on a native catalog: data type, defined size and nullability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeType {
    pub data_type: NativeDataType,
    /// Defined size in characters or bytes; 0 for dates and long values.
    pub defined_size: u32,
    pub nullable: bool,
}

impl fmt::Display for NativeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?}({}) {}",
            self.data_type,
            self.defined_size,
            if self.nullable { "NULL" } else { "NOT NULL" }
        )
    }
}

/// Engine-specific description of a column type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeDescriptor {
    /// Type token for DDL text, including the NULL/NOT NULL clause.
    Sql(String),
    /// Type for a native catalog API.
    Native(NativeType),
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDescriptor::Sql(token) => f.write_str(token),
            TypeDescriptor::Native(native) => native.fmt(f),
        }
    }
}

/// Result of mapping an abstract column type to a target engine.
#[derive(Debug, Clone)]
pub struct TypeMapping {
    pub descriptor: TypeDescriptor,
    /// Whether this mapping loses range or precision.
    pub is_lossy: bool,
    /// Warning message for lossy mappings.
    pub warning: Option<String>,
}

impl TypeMapping {
    /// Create a lossless type mapping.
    pub fn lossless(descriptor: TypeDescriptor) -> Self {
        Self {
            descriptor,
            is_lossy: false,
            warning: None,
        }
    }

    /// Create a lossy type mapping with a warning.
    pub fn lossy(descriptor: TypeDescriptor, warning: impl Into<String>) -> Self {
        Self {
            descriptor,
            is_lossy: true,
            warning: Some(warning.into()),
        }
    }

    /// DDL type token, if this is a script mapping.
    pub fn sql(&self) -> Option<&str> {
        match &self.descriptor {
            TypeDescriptor::Sql(token) => Some(token),
            TypeDescriptor::Native(_) => None,
        }
    }

    /// Native catalog type, if this is a catalog mapping.
    pub fn native(&self) -> Option<&NativeType> {
        match &self.descriptor {
            TypeDescriptor::Native(native) => Some(native),
            TypeDescriptor::Sql(_) => None,
        }
    }
}

/// Identifier and type rules for one engine.
pub trait Dialect: Send + Sync {
    fn engine(&self) -> EngineKind;

    /// Get the dialect identifier (e.g., "sql", "jet").
    fn name(&self) -> &str {
        self.engine().name()
    }

    /// Make a name safe for this engine.
    fn sanitize(&self, name: &str) -> Result<SafeIdent>;

    /// Map an abstract type and its facets to this engine.
    fn map_type(&self, column_type: ColumnType, max_length: i32, nullable: bool)
        -> Result<TypeMapping>;

    /// Map a column of `table`.
    ///
    /// Primary key columns are always mapped NOT NULL. Unresolved types are
    /// an argument error for the table; unmapped types name the column.
    fn map_column(&self, table: &Table, column: &Column) -> Result<TypeMapping> {
        let column_type = column.column_type.ok_or_else(|| {
            Xsd2DbError::argument(
                &table.name,
                format!(
                    "cannot resolve type '{}' of column {}",
                    column.source_type.as_deref().unwrap_or("?"),
                    column.name
                ),
            )
        })?;
        let nullable = column.nullable && !table.is_pk_column(&column.name);

        self.map_type(column_type, column.max_length, nullable)
            .map_err(|e| match e {
                Xsd2DbError::UnsupportedType {
                    type_name, engine, ..
                } => Xsd2DbError::UnsupportedType {
                    table: table.name.clone(),
                    column: column.name.clone(),
                    type_name,
                    engine,
                },
                other => other,
            })
    }
}

/// DDL text generation for engines driven by scripts.
///
/// All identifiers passed in are already sanitized.
pub trait DdlDialect: Dialect {
    /// Idempotent create-database statement.
    ///
    /// With `overwrite`, an existing database of the same name is dropped
    /// first; otherwise creation is skipped when it already exists.
    fn create_database_sql(&self, database: &SafeIdent, overwrite: bool) -> String;

    /// Qualify a table name with an owner. An empty owner leaves it unqualified.
    fn qualify_table(&self, owner: &str, table: &SafeIdent) -> Result<String>;

    /// Drop-if-exists followed by create-table.
    fn create_table_sql(&self, qualified_table: &str, column_defs: &[String]) -> String;

    fn primary_key_sql(
        &self,
        qualified_table: &str,
        constraint: &SafeIdent,
        columns: &[SafeIdent],
    ) -> String;

    /// Foreign key with the fixed cascade-delete, no-action-update rules.
    fn foreign_key_sql(
        &self,
        qualified_child: &str,
        constraint: &SafeIdent,
        child_columns: &[SafeIdent],
        qualified_parent: &str,
        parent_columns: &[SafeIdent],
    ) -> String;

    /// Statement switching a script's session into `database`, if the
    /// engine has one.
    fn use_database_sql(&self, _database: &SafeIdent) -> Option<String> {
        None
    }

    /// Batch separator for script output, if the engine's tooling uses one.
    fn batch_separator(&self) -> Option<&str> {
        None
    }
}

/// Options for [`SchemaAdapter::create`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOptions {
    /// Drop and recreate an existing database of the same name.
    #[serde(default)]
    pub overwrite: bool,

    /// Prefix applied to every table name.
    #[serde(default)]
    pub table_prefix: String,

    /// Owner/schema qualifier for table names (default: "dbo").
    #[serde(default = "default_owner")]
    pub owner: String,

    /// Skip the create-database step and use an existing catalog.
    #[serde(default)]
    pub use_existing: bool,
}

fn default_owner() -> String {
    "dbo".to_string()
}

impl Default for CreateOptions {
    fn default() -> Self {
        Self {
            overwrite: false,
            table_prefix: String::new(),
            owner: default_owner(),
            use_existing: false,
        }
    }
}

/// What happened to the database during a create run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseStep {
    /// The create-database step ran (creating, recreating or keeping the database).
    Created,
    /// `use_existing` skipped the create-database step.
    UsedExisting,
}

/// Summary of a create run.
#[derive(Debug, Serialize)]
pub struct CreateReport {
    pub engine: EngineKind,
    pub database: String,
    pub database_step: DatabaseStep,
    pub statements_executed: usize,
    pub tables_created: usize,
    pub primary_keys_created: usize,
    pub relations_created: usize,
    /// Entities skipped because they failed validation or mapping.
    pub skipped: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_secs: f64,
    #[serde(skip)]
    pub failures: Vec<Xsd2DbError>,
}

impl CreateReport {
    pub fn new(engine: EngineKind, database: impl Into<String>, database_step: DatabaseStep) -> Self {
        let now = Utc::now();
        Self {
            engine,
            database: database.into(),
            database_step,
            statements_executed: 0,
            tables_created: 0,
            primary_keys_created: 0,
            relations_created: 0,
            skipped: Vec::new(),
            started_at: now,
            completed_at: now,
            duration_secs: 0.0,
            failures: Vec::new(),
        }
    }

    /// Record an entity that was skipped.
    pub fn skip(&mut self, failure: Xsd2DbError) {
        self.skipped.push(failure.to_string());
        self.failures.push(failure);
    }

    pub fn finish(&mut self) {
        self.completed_at = Utc::now();
        self.duration_secs =
            (self.completed_at - self.started_at).num_milliseconds() as f64 / 1000.0;
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Turn recorded failures into an [`Xsd2DbError::Incomplete`].
    pub fn take_failures(&mut self) -> Option<Xsd2DbError> {
        if self.failures.is_empty() {
            None
        } else {
            Some(Xsd2DbError::Incomplete {
                failures: std::mem::take(&mut self.failures),
            })
        }
    }
}

/// Creates a database and its schema on one engine.
///
/// Each call owns its connections or catalog handles for its whole
/// duration and releases them on every exit path.
#[async_trait]
pub trait SchemaAdapter: Send + Sync {
    fn engine(&self) -> EngineKind;

    /// Create an empty database named after the schema.
    async fn create_database(&self, schema: &Schema, overwrite: bool) -> Result<()>;

    /// Create the database (unless `use_existing`), then its tables,
    /// primary keys and relations, in that order.
    async fn create(&self, schema: &Schema, options: &CreateOptions) -> Result<CreateReport>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_mapping_lossless() {
        let mapping = TypeMapping::lossless(TypeDescriptor::Sql("bigint NOT NULL".into()));
        assert_eq!(mapping.sql(), Some("bigint NOT NULL"));
        assert!(!mapping.is_lossy);
        assert!(mapping.warning.is_none());
        assert!(mapping.native().is_none());
    }

    #[test]
    fn test_type_mapping_lossy() {
        let mapping = TypeMapping::lossy(TypeDescriptor::Sql("real NULL".into()), "narrowed");
        assert!(mapping.is_lossy);
        assert_eq!(mapping.warning.as_deref(), Some("narrowed"));
    }

    #[test]
    fn test_native_type_display() {
        let native = NativeType {
            data_type: NativeDataType::WChar,
            defined_size: 80,
            nullable: true,
        };
        assert_eq!(native.to_string(), "WChar(80) NULL");
    }

    #[test]
    fn test_create_options_defaults() {
        let options: CreateOptions = serde_yaml::from_str("overwrite: true").unwrap();
        assert!(options.overwrite);
        assert_eq!(options.owner, "dbo");
        assert_eq!(options.table_prefix, "");
        assert!(!options.use_existing);
        assert_eq!(CreateOptions::default().owner, "dbo");
    }

    #[test]
    fn test_report_collects_failures() {
        let mut report = CreateReport::new(EngineKind::Jet, "db", DatabaseStep::Created);
        assert!(report.is_complete());
        report.skip(Xsd2DbError::argument("Empty", "no columns"));
        assert!(!report.is_complete());
        assert_eq!(report.skipped.len(), 1);
        let err = report.take_failures().unwrap();
        assert!(matches!(err, Xsd2DbError::Incomplete { ref failures } if failures.len() == 1));
        assert!(report.take_failures().is_none());
    }
}
