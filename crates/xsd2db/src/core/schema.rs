//! Relational schema model: tables, columns, primary keys and relations.
//!
//! A [`Schema`] is built once by a loader, consumed read-only by the
//! compiler and adapters, and then dropped. Relations refer to tables and
//! columns by name so that generation order never depends on reference
//! cycles between tables.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Abstract column type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Int64,
    UInt64,
    Int32,
    UInt32,
    Int16,
    UInt16,
    Byte,
    Boolean,
    Char,
    DateTime,
    Double,
    Decimal,
    Guid,
    String,
    TimeSpan,
    /// Fixed binary blob (`byte[]`).
    Binary,
    /// Variable-length character blob (`char[]`).
    CharBlob,
}

impl ColumnType {
    /// Stable type name used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            ColumnType::Int64 => "Int64",
            ColumnType::UInt64 => "UInt64",
            ColumnType::Int32 => "Int32",
            ColumnType::UInt32 => "UInt32",
            ColumnType::Int16 => "Int16",
            ColumnType::UInt16 => "UInt16",
            ColumnType::Byte => "Byte",
            ColumnType::Boolean => "Boolean",
            ColumnType::Char => "Char",
            ColumnType::DateTime => "DateTime",
            ColumnType::Double => "Double",
            ColumnType::Decimal => "Decimal",
            ColumnType::Guid => "Guid",
            ColumnType::String => "String",
            ColumnType::TimeSpan => "TimeSpan",
            ColumnType::Binary => "Byte[]",
            ColumnType::CharBlob => "Char[]",
        }
    }

    /// True for types whose max length facet is meaningful.
    pub fn is_sized(&self) -> bool {
        matches!(
            self,
            ColumnType::String | ColumnType::Binary | ColumnType::CharBlob
        )
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Column metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name, unique within its table.
    pub name: String,

    /// Abstract data type. `None` when the loader could not resolve one.
    #[serde(rename = "type", default)]
    pub column_type: Option<ColumnType>,

    /// Type name as written in the source, kept for diagnostics on unresolved types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_type: Option<String>,

    /// Maximum length for sized types. Negative means unbounded.
    #[serde(default = "unbounded")]
    pub max_length: i32,

    /// Whether the column accepts NULL.
    #[serde(default = "default_true")]
    pub nullable: bool,
}

fn unbounded() -> i32 {
    -1
}

fn default_true() -> bool {
    true
}

impl Column {
    /// Create a nullable, unbounded column of the given type.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type: Some(column_type),
            source_type: None,
            max_length: -1,
            nullable: true,
        }
    }

    /// Create a column whose type the loader could not resolve.
    pub fn unresolved(name: impl Into<String>, source_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: None,
            source_type: Some(source_type.into()),
            max_length: -1,
            nullable: true,
        }
    }

    pub fn with_max_length(mut self, max_length: i32) -> Self {
        self.max_length = max_length;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }
}

/// Table metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Table name, unique within the schema.
    pub name: String,

    /// Columns in declared order.
    #[serde(default)]
    pub columns: Vec<Column>,

    /// Primary key column names in declared order, if a key is declared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<Vec<String>>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: None,
        }
    }

    pub fn with_column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    pub fn with_primary_key<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_key = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Check if the table declares a non-empty primary key.
    pub fn has_pk(&self) -> bool {
        self.primary_key.as_ref().is_some_and(|pk| !pk.is_empty())
    }

    /// True if the column participates in the primary key.
    pub fn is_pk_column(&self, name: &str) -> bool {
        self.primary_key
            .as_ref()
            .is_some_and(|pk| pk.iter().any(|c| c == name))
    }
}

/// Foreign-key relation between two tables, by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    /// Relation name, unique within the schema. Used as the constraint name.
    pub name: String,
    pub parent_table: String,
    pub parent_columns: Vec<String>,
    pub child_table: String,
    pub child_columns: Vec<String>,
}

impl Relation {
    pub fn new(
        name: impl Into<String>,
        parent_table: impl Into<String>,
        parent_columns: Vec<String>,
        child_table: impl Into<String>,
        child_columns: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            parent_table: parent_table.into(),
            parent_columns,
            child_table: child_table.into(),
            child_columns,
        }
    }

    /// True if the relation touches the named table on either side.
    pub fn involves(&self, table: &str) -> bool {
        self.parent_table == table || self.child_table == table
    }
}

/// A named collection of tables and relations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// Schema name; also the database name unless overridden.
    pub name: String,

    #[serde(default)]
    pub tables: Vec<Table>,

    #[serde(default)]
    pub relations: Vec<Relation>,
}

impl Schema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: Vec::new(),
            relations: Vec::new(),
        }
    }

    pub fn with_table(mut self, table: Table) -> Self {
        self.tables.push(table);
        self
    }

    pub fn with_relation(mut self, relation: Relation) -> Self {
        self.relations.push(relation);
        self
    }

    /// Look up a table by name.
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }
}
