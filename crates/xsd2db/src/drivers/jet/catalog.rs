//! File-backed Jet catalog.
//!
//! A catalog is a JSON document at `<dir>/<name>.jet.json`. Opening it takes
//! an exclusive lock file next to it (`<name>.jet.lock`) that is held for
//! the lifetime of the [`CatalogHandle`]. The lock is released by
//! [`CatalogHandle::close`] or, failing that, when the handle is dropped.
//!
//! The handle exposes catalog primitives (append table, append key) and
//! enforces what the desktop engine enforces at runtime: duplicate names,
//! keys over existing columns, foreign keys referencing a primary key, and
//! row-level primary key uniqueness and referential integrity with cascading
//! deletes. Every mutation is written through to disk. Engine failures carry
//! the engine's native error numbers from [`codes`].

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::traits::{NativeDataType, NativeType};
use crate::error::{Result, Xsd2DbError};

/// Native error numbers reported by the catalog.
pub mod codes {
    pub const TABLE_EXISTS: i32 = 3010;
    pub const OBJECT_EXISTS: i32 = 3012;
    pub const DUPLICATE_KEY: i32 = 3022;
    pub const FIELD_TOO_SMALL: i32 = 3163;
    pub const NO_UNIQUE_INDEX: i32 = 3173;
    pub const DUPLICATE_FIELD: i32 = 3191;
    pub const RELATED_RECORD_REQUIRED: i32 = 3201;
    pub const DATABASE_EXISTS: i32 = 3204;
    pub const ITEM_NOT_FOUND: i32 = 3265;
    pub const PRIMARY_KEY_EXISTS: i32 = 3283;
    pub const NULL_NOT_ALLOWED: i32 = 3314;
    pub const TYPE_CONVERSION: i32 = 3421;
}

/// File extension of catalog documents.
pub const CATALOG_EXTENSION: &str = "jet.json";

const LOCK_EXTENSION: &str = "jet.lock";
const FORMAT_VERSION: u32 = 1;

/// A row, keyed by column name.
pub type Row = BTreeMap<String, Value>;

/// Column definition in a catalog table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogColumn {
    pub name: String,
    #[serde(flatten)]
    pub native: NativeType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyKind {
    Primary,
    Foreign,
}

/// Referential action for a foreign key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rule {
    None,
    Cascade,
}

/// A primary or foreign key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogKey {
    pub name: String,
    pub kind: KeyKind,
    pub columns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_table: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related_columns: Vec<String>,
    pub delete_rule: Rule,
    pub update_rule: Rule,
}

impl CatalogKey {
    pub fn primary(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            kind: KeyKind::Primary,
            columns,
            related_table: None,
            related_columns: Vec::new(),
            delete_rule: Rule::None,
            update_rule: Rule::None,
        }
    }

    /// Foreign key with cascading delete and no update action.
    pub fn foreign(
        name: impl Into<String>,
        columns: Vec<String>,
        related_table: impl Into<String>,
        related_columns: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: KeyKind::Foreign,
            columns,
            related_table: Some(related_table.into()),
            related_columns,
            delete_rule: Rule::Cascade,
            update_rule: Rule::None,
        }
    }

    fn references(&self, table: &str) -> bool {
        self.kind == KeyKind::Foreign
            && self
                .related_table
                .as_deref()
                .is_some_and(|t| same(t, table))
    }
}

/// A table in the catalog, with its keys and rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogTable {
    pub name: String,
    pub columns: Vec<CatalogColumn>,
    #[serde(default)]
    pub keys: Vec<CatalogKey>,
    #[serde(default)]
    pub rows: Vec<Row>,
}

impl CatalogTable {
    pub fn column(&self, name: &str) -> Option<&CatalogColumn> {
        self.columns.iter().find(|c| same(&c.name, name))
    }

    pub fn primary_key(&self) -> Option<&CatalogKey> {
        self.keys.iter().find(|k| k.kind == KeyKind::Primary)
    }

    pub fn foreign_keys(&self) -> impl Iterator<Item = &CatalogKey> {
        self.keys.iter().filter(|k| k.kind == KeyKind::Foreign)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CatalogFile {
    format_version: u32,
    name: String,
    created_at: DateTime<Utc>,
    tables: Vec<CatalogTable>,
}

/// Path of the catalog called `name` inside `dir`.
pub fn catalog_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.{}", name, CATALOG_EXTENSION))
}

fn lock_path(path: &Path) -> PathBuf {
    let stem = path
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.strip_suffix(CATALOG_EXTENSION))
        .unwrap_or("catalog.");
    path.with_file_name(format!("{}{}", stem, LOCK_EXTENSION))
}

fn same(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

fn not_found(what: impl std::fmt::Display) -> Xsd2DbError {
    Xsd2DbError::engine(
        codes::ITEM_NOT_FOUND,
        format!("Item not found in this collection: {}", what),
    )
}

/// Exclusive lock on a catalog file, released on drop.
#[derive(Debug)]
struct FileLock {
    path: PathBuf,
    released: bool,
}

impl FileLock {
    fn acquire(catalog: &Path) -> Result<Self> {
        let path = lock_path(catalog);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => {
                debug!("Acquired catalog lock {}", path.display());
                Ok(Self {
                    path,
                    released: false,
                })
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(Xsd2DbError::resource(
                "catalog is locked by another handle",
                path.display().to_string(),
            )),
            Err(e) => Err(Xsd2DbError::resource(
                format!("failed to lock catalog: {}", e),
                path.display().to_string(),
            )),
        }
    }

    fn release(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        fs::remove_file(&self.path).map_err(|e| {
            Xsd2DbError::resource(
                format!("failed to release catalog lock: {}", e),
                self.path.display().to_string(),
            )
        })?;
        debug!("Released catalog lock {}", self.path.display());
        Ok(())
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!("{}", e);
        }
    }
}

/// An open catalog. Holds the exclusive lock until closed or dropped.
#[derive(Debug)]
pub struct CatalogHandle {
    path: PathBuf,
    data: CatalogFile,
    lock: FileLock,
}

impl CatalogHandle {
    /// True if a catalog document exists at `path`.
    pub fn exists(path: &Path) -> bool {
        path.is_file()
    }

    /// Delete the catalog at `path`. Fails if it is currently open.
    pub fn delete(path: &Path) -> Result<()> {
        let lock = FileLock::acquire(path)?;
        let removed = fs::remove_file(path);
        drop(lock);
        match removed {
            Ok(()) => {
                info!("Deleted catalog {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Xsd2DbError::resource(
                format!("failed to delete catalog: {}", e),
                path.display().to_string(),
            )),
        }
    }

    /// Create a new, empty catalog and open it.
    pub fn create(path: &Path, name: &str) -> Result<Self> {
        if Self::exists(path) {
            return Err(Xsd2DbError::engine(
                codes::DATABASE_EXISTS,
                format!("Database '{}' already exists.", path.display()),
            ));
        }
        let lock = FileLock::acquire(path)?;
        let handle = Self {
            path: path.to_path_buf(),
            data: CatalogFile {
                format_version: FORMAT_VERSION,
                name: name.to_string(),
                created_at: Utc::now(),
                tables: Vec::new(),
            },
            lock,
        };
        handle.save()?;
        info!("Created catalog {}", path.display());
        Ok(handle)
    }

    /// Open an existing catalog.
    pub fn open(path: &Path) -> Result<Self> {
        if !Self::exists(path) {
            return Err(Xsd2DbError::resource(
                "catalog does not exist",
                path.display().to_string(),
            ));
        }
        let lock = FileLock::acquire(path)?;
        let content = fs::read_to_string(path)?;
        let data: CatalogFile = serde_json::from_str(&content)?;
        if data.format_version != FORMAT_VERSION {
            return Err(Xsd2DbError::resource(
                format!("unsupported catalog format version {}", data.format_version),
                path.display().to_string(),
            ));
        }
        debug!("Opened catalog {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            data,
            lock,
        })
    }

    /// Release the catalog. Changes are already on disk.
    pub fn close(mut self) -> Result<()> {
        self.lock.release()?;
        debug!("Closed catalog {}", self.path.display());
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.data.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn tables(&self) -> &[CatalogTable] {
        &self.data.tables
    }

    pub fn table(&self, name: &str) -> Option<&CatalogTable> {
        self.data.tables.iter().find(|t| same(&t.name, name))
    }

    pub fn rows(&self, table: &str) -> Result<&[Row]> {
        Ok(&self.data.tables[self.table_index(table)?].rows)
    }

    fn table_index(&self, name: &str) -> Result<usize> {
        self.data
            .tables
            .iter()
            .position(|t| same(&t.name, name))
            .ok_or_else(|| not_found(format!("table {}", name)))
    }

    fn save(&self) -> Result<()> {
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(&self.data)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Append a table with its columns.
    pub fn append_table(&mut self, name: &str, columns: Vec<CatalogColumn>) -> Result<()> {
        if self.table(name).is_some() {
            return Err(Xsd2DbError::engine(
                codes::TABLE_EXISTS,
                format!("Table '{}' already exists.", name),
            ));
        }
        for (i, column) in columns.iter().enumerate() {
            if columns[..i].iter().any(|c| same(&c.name, &column.name)) {
                return Err(Xsd2DbError::engine(
                    codes::DUPLICATE_FIELD,
                    format!("Field '{}' is defined more than once in '{}'.", column.name, name),
                ));
            }
        }

        self.data.tables.push(CatalogTable {
            name: name.to_string(),
            columns,
            keys: Vec::new(),
            rows: Vec::new(),
        });
        self.save()?;
        debug!("Appended table {}", name);
        Ok(())
    }

    /// Drop a table and every foreign key referencing it.
    pub fn drop_table(&mut self, name: &str) -> Result<()> {
        let index = self.table_index(name)?;
        self.data.tables.remove(index);
        for table in &mut self.data.tables {
            table.keys.retain(|k| !k.references(name));
        }
        self.save()?;
        debug!("Dropped table {}", name);
        Ok(())
    }

    /// Append a primary or foreign key to `table`.
    pub fn append_key(&mut self, table: &str, key: CatalogKey) -> Result<()> {
        let index = self.table_index(table)?;
        let target = &self.data.tables[index];

        if target.keys.iter().any(|k| same(&k.name, &key.name)) {
            return Err(Xsd2DbError::engine(
                codes::OBJECT_EXISTS,
                format!("Object '{}' already exists.", key.name),
            ));
        }
        if let Some(missing) = key.columns.iter().find(|c| target.column(c).is_none()) {
            return Err(not_found(format!("column {}.{}", table, missing)));
        }

        match key.kind {
            KeyKind::Primary => {
                if target.primary_key().is_some() {
                    return Err(Xsd2DbError::engine(
                        codes::PRIMARY_KEY_EXISTS,
                        format!("Primary key already exists on '{}'.", table),
                    ));
                }
            }
            KeyKind::Foreign => self.check_foreign_key(&key)?,
        }

        let target = &mut self.data.tables[index];
        if key.kind == KeyKind::Primary {
            for column in &mut target.columns {
                if key.columns.iter().any(|c| same(c, &column.name)) {
                    column.native.nullable = false;
                }
            }
        }
        debug!("Appended {:?} key {} on {}", key.kind, key.name, table);
        target.keys.push(key);
        self.save()
    }

    fn check_foreign_key(&self, key: &CatalogKey) -> Result<()> {
        let related_name = key.related_table.as_deref().unwrap_or_default();
        let related = self
            .table(related_name)
            .ok_or_else(|| not_found(format!("table {}", related_name)))?;
        if let Some(missing) = key.related_columns.iter().find(|c| related.column(c).is_none()) {
            return Err(not_found(format!("column {}.{}", related_name, missing)));
        }

        let matches_pk = related.primary_key().is_some_and(|pk| {
            pk.columns.len() == key.related_columns.len()
                && pk
                    .columns
                    .iter()
                    .zip(&key.related_columns)
                    .all(|(a, b)| same(a, b))
        });
        if !matches_pk || key.columns.len() != key.related_columns.len() {
            return Err(Xsd2DbError::engine(
                codes::NO_UNIQUE_INDEX,
                format!(
                    "No unique index found for the referenced field of the primary table '{}'.",
                    related_name
                ),
            ));
        }
        Ok(())
    }

    /// Insert a row, enforcing nullability, key uniqueness and referential integrity.
    pub fn insert(&mut self, table: &str, values: &[(&str, Value)]) -> Result<()> {
        let index = self.table_index(table)?;
        let target = &self.data.tables[index];

        let mut row = Row::new();
        for (name, value) in values {
            let column = target
                .column(name)
                .ok_or_else(|| not_found(format!("column {}.{}", table, name)))?;
            row.insert(column.name.clone(), coerce(column, value)?);
        }

        for column in &target.columns {
            if !column.native.nullable && row.get(&column.name).map_or(true, Value::is_null) {
                return Err(Xsd2DbError::engine(
                    codes::NULL_NOT_ALLOWED,
                    format!("You must enter a value in the '{}.{}' field.", table, column.name),
                ));
            }
        }

        if let Some(pk) = target.primary_key() {
            let key = project(&row, &pk.columns);
            if target.rows.iter().any(|r| project(r, &pk.columns) == key) {
                return Err(Xsd2DbError::engine(
                    codes::DUPLICATE_KEY,
                    format!(
                        "The changes you requested to the table '{}' were not successful because they would create duplicate values in the primary key.",
                        table
                    ),
                ));
            }
        }

        for fk in target.foreign_keys() {
            let values = project(&row, &fk.columns);
            if values.iter().any(Value::is_null) {
                continue;
            }
            let parent_name = fk.related_table.as_deref().unwrap_or_default();
            let parent = self
                .table(parent_name)
                .ok_or_else(|| not_found(format!("table {}", parent_name)))?;
            if !parent
                .rows
                .iter()
                .any(|r| project(r, &fk.related_columns) == values)
            {
                return Err(Xsd2DbError::engine(
                    codes::RELATED_RECORD_REQUIRED,
                    format!(
                        "You cannot add or change a record because a related record is required in table '{}'.",
                        parent_name
                    ),
                ));
            }
        }

        self.data.tables[index].rows.push(row);
        self.save()
    }

    /// Delete rows matching every `(column, value)` pair, cascading to children.
    ///
    /// Returns the number of rows removed across all tables.
    pub fn delete_rows(&mut self, table: &str, criteria: &[(&str, Value)]) -> Result<usize> {
        let index = self.table_index(table)?;
        let target = &self.data.tables[index];

        let mut resolved = Vec::with_capacity(criteria.len());
        for (name, value) in criteria {
            let column = target
                .column(name)
                .ok_or_else(|| not_found(format!("column {}.{}", table, name)))?;
            resolved.push((column.name.clone(), coerce(column, value)?));
        }

        let removed = self.delete_where(index, &resolved);
        self.save()?;
        debug!("Deleted {} rows starting from {}", removed, table);
        Ok(removed)
    }

    fn delete_where(&mut self, index: usize, criteria: &[(String, Value)]) -> usize {
        let table = &mut self.data.tables[index];
        let (gone, kept): (Vec<Row>, Vec<Row>) = table
            .rows
            .drain(..)
            .partition(|r| criteria.iter().all(|(c, v)| r.get(c) == Some(v)));
        table.rows = kept;
        let parent_name = table.name.clone();
        let parent = parent_name.as_str();

        let children: Vec<(usize, Vec<String>, Vec<String>)> = self
            .data
            .tables
            .iter()
            .enumerate()
            .flat_map(move |(i, t)| {
                t.foreign_keys()
                    .filter(move |k| k.delete_rule == Rule::Cascade && k.references(parent))
                    .map(move |k| (i, k.columns.clone(), k.related_columns.clone()))
            })
            .collect();

        let mut removed = gone.len();
        for row in &gone {
            for (child, columns, related) in &children {
                let criteria: Vec<(String, Value)> = columns
                    .iter()
                    .cloned()
                    .zip(related.iter().map(|c| row.get(c).cloned().unwrap_or(Value::Null)))
                    .collect();
                removed += self.delete_where(*child, &criteria);
            }
        }
        removed
    }
}

fn project(row: &Row, columns: &[String]) -> Vec<Value> {
    columns
        .iter()
        .map(|c| row.get(c).cloned().unwrap_or(Value::Null))
        .collect()
}

fn type_mismatch(column: &CatalogColumn, value: &Value) -> Xsd2DbError {
    Xsd2DbError::engine(
        codes::TYPE_CONVERSION,
        format!(
            "Data type conversion error: {} for field '{}' ({:?}).",
            value, column.name, column.native.data_type
        ),
    )
}

/// Check a value against the column type, normalizing GUIDs.
fn coerce(column: &CatalogColumn, value: &Value) -> Result<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }

    match column.native.data_type {
        NativeDataType::Guid => {
            let text = value.as_str().ok_or_else(|| type_mismatch(column, value))?;
            let guid = Uuid::parse_str(text.trim_matches(|c| c == '{' || c == '}'))
                .map_err(|_| type_mismatch(column, value))?;
            Ok(Value::String(guid.hyphenated().to_string()))
        }
        NativeDataType::WChar | NativeDataType::LongVarWChar => {
            let text = value.as_str().ok_or_else(|| type_mismatch(column, value))?;
            let size = column.native.defined_size as usize;
            if size > 0 && text.chars().count() > size {
                return Err(Xsd2DbError::engine(
                    codes::FIELD_TOO_SMALL,
                    format!(
                        "The field '{}' is too small to accept the amount of data you attempted to add.",
                        column.name
                    ),
                ));
            }
            Ok(value.clone())
        }
        NativeDataType::Boolean => {
            if value.is_boolean() {
                Ok(value.clone())
            } else {
                Err(type_mismatch(column, value))
            }
        }
        NativeDataType::BigInt
        | NativeDataType::UnsignedBigInt
        | NativeDataType::Integer
        | NativeDataType::UnsignedInt
        | NativeDataType::SmallInt
        | NativeDataType::UnsignedSmallInt
        | NativeDataType::TinyInt
        | NativeDataType::Double
        | NativeDataType::Decimal => {
            if value.is_number() {
                Ok(value.clone())
            } else {
                Err(type_mismatch(column, value))
            }
        }
        NativeDataType::Date | NativeDataType::DbTime | NativeDataType::LongVarBinary => {
            Ok(value.clone())
        }
    }
}
