//! Native catalog adapter for Jet.
//!
//! Performs the same passes as the script compiler (tables, then primary
//! keys, then foreign keys) by calling catalog primitives instead of
//! emitting DDL text.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::compiler::{check, ValidationMode};
use crate::core::engine::EngineKind;
use crate::core::schema::{Relation, Schema, Table};
use crate::core::traits::{CreateOptions, CreateReport, DatabaseStep, Dialect, SchemaAdapter};
use crate::error::{Result, Xsd2DbError};

use super::catalog::{catalog_path, CatalogColumn, CatalogHandle, CatalogKey};
use super::dialect::JetDialect;

/// Creates schemas in file-backed Jet catalogs under one directory.
#[derive(Debug, Clone)]
pub struct JetAdapter {
    directory: PathBuf,
    dialect: JetDialect,
}

impl JetAdapter {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            dialect: JetDialect::new(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Path of the catalog for a database name.
    pub fn catalog_path(&self, database: &str) -> Result<PathBuf> {
        if database.trim().is_empty() {
            return Err(Xsd2DbError::argument(
                "databaseName",
                "The database name passed is empty",
            ));
        }
        let name = self.dialect.sanitize(database)?;
        Ok(catalog_path(&self.directory, name.as_str()))
    }

    /// Create the catalog, or open it if it exists and `overwrite` is off.
    fn create_catalog(&self, database: &str, overwrite: bool) -> Result<CatalogHandle> {
        let path = self.catalog_path(database)?;
        if CatalogHandle::exists(&path) {
            if !overwrite {
                info!("Catalog {} already exists, reusing it", path.display());
                return CatalogHandle::open(&path);
            }
            CatalogHandle::delete(&path)?;
        }
        CatalogHandle::create(&path, database)
    }

    fn table_name(&self, options: &CreateOptions, table: &str) -> Result<String> {
        Ok(self
            .dialect
            .sanitize(&format!("{}{}", options.table_prefix, table))?
            .bare()
            .to_string())
    }

    fn column_names(&self, names: &[String]) -> Result<Vec<String>> {
        names
            .iter()
            .map(|n| Ok(self.dialect.sanitize(n)?.bare().to_string()))
            .collect()
    }

    fn table_columns(&self, table: &Table) -> Result<Vec<CatalogColumn>> {
        table
            .columns
            .iter()
            .map(|column| {
                let mapping = self.dialect.map_column(table, column)?;
                let native = mapping.native().cloned().ok_or_else(|| {
                    Xsd2DbError::UnsupportedType {
                        table: table.name.clone(),
                        column: column.name.clone(),
                        type_name: mapping.descriptor.to_string(),
                        engine: EngineKind::Jet.name().to_string(),
                    }
                })?;
                Ok(CatalogColumn {
                    name: self.dialect.sanitize(&column.name)?.bare().to_string(),
                    native,
                })
            })
            .collect()
    }

    fn append_table(
        &self,
        handle: &mut CatalogHandle,
        table: &Table,
        options: &CreateOptions,
    ) -> Result<()> {
        let name = self.table_name(options, &table.name)?;
        if handle.table(&name).is_some() {
            handle.drop_table(&name)?;
        }
        handle.append_table(&name, self.table_columns(table)?)
    }

    fn append_primary_key(
        &self,
        handle: &mut CatalogHandle,
        table: &Table,
        options: &CreateOptions,
    ) -> Result<()> {
        let name = self.table_name(options, &table.name)?;
        let columns = self.column_names(table.primary_key.as_deref().unwrap_or_default())?;
        handle.append_key(&name, CatalogKey::primary(name.clone(), columns))
    }

    fn append_relation(
        &self,
        handle: &mut CatalogHandle,
        relation: &Relation,
        options: &CreateOptions,
    ) -> Result<()> {
        let child = self.table_name(options, &relation.child_table)?;
        let parent = self.table_name(options, &relation.parent_table)?;
        let key = CatalogKey::foreign(
            self.dialect.sanitize(&relation.name)?.bare(),
            self.column_names(&relation.child_columns)?,
            parent,
            self.column_names(&relation.parent_columns)?,
        );
        handle.append_key(&child, key)
    }

    /// Run the three passes against an open catalog.
    ///
    /// Invalid or unmappable entities are skipped and recorded in the
    /// report; engine failures propagate.
    fn populate(
        &self,
        handle: &mut CatalogHandle,
        schema: &Schema,
        options: &CreateOptions,
        report: &mut CreateReport,
    ) -> Result<()> {
        let validation = check(schema, ValidationMode::Catalog);
        for failure in validation.entity_errors() {
            warn!("Skipping invalid entity: {}", failure);
            report.skip(failure);
        }

        let mut created: Vec<&Table> = Vec::new();
        for (index, table) in schema.tables.iter().enumerate() {
            if !validation.table_is_valid(index) {
                continue;
            }
            match self.append_table(handle, table, options) {
                Ok(()) => {
                    debug!("Created table {}", table.name);
                    created.push(table);
                    report.tables_created += 1;
                }
                Err(e @ (Xsd2DbError::Argument { .. } | Xsd2DbError::UnsupportedType { .. })) => {
                    let e = e.for_entity(&table.name);
                    warn!("Skipping table {}: {}", table.name, e);
                    report.skip(e);
                }
                Err(e) => return Err(e),
            }
        }

        for table in created.iter().filter(|t| t.has_pk()) {
            self.append_primary_key(handle, table, options)?;
            report.primary_keys_created += 1;
        }

        let created: Vec<&str> = created.iter().map(|t| t.name.as_str()).collect();
        for (index, relation) in schema.relations.iter().enumerate() {
            if !validation.relation_is_valid(index) {
                continue;
            }
            if !created.contains(&relation.parent_table.as_str())
                || !created.contains(&relation.child_table.as_str())
            {
                report.skip(Xsd2DbError::argument(
                    &relation.name,
                    "skipped because a related table was not created",
                ));
                continue;
            }
            self.append_relation(handle, relation, options)?;
            report.relations_created += 1;
        }

        Ok(())
    }
}

#[async_trait]
impl SchemaAdapter for JetAdapter {
    fn engine(&self) -> EngineKind {
        EngineKind::Jet
    }

    async fn create_database(&self, schema: &Schema, overwrite: bool) -> Result<()> {
        self.create_catalog(&schema.name, overwrite)?.close()
    }

    async fn create(&self, schema: &Schema, options: &CreateOptions) -> Result<CreateReport> {
        let (mut handle, step) = if options.use_existing {
            (
                CatalogHandle::open(&self.catalog_path(&schema.name)?)?,
                DatabaseStep::UsedExisting,
            )
        } else {
            (
                self.create_catalog(&schema.name, options.overwrite)?,
                DatabaseStep::Created,
            )
        };
        info!("Populating catalog {}", handle.path().display());

        let mut report = CreateReport::new(EngineKind::Jet, &schema.name, step);
        let populated = self.populate(&mut handle, schema, options, &mut report);
        let closed = handle.close();
        populated?;
        closed?;

        report.finish();
        info!(
            "Created {} tables, {} primary keys, {} relations in {:.2}s",
            report.tables_created,
            report.primary_keys_created,
            report.relations_created,
            report.duration_secs
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::fixtures::master_detail;
    use crate::core::schema::{Column, ColumnType};
    use crate::drivers::jet::catalog::codes;
    use serde_json::json;
    use tempfile::TempDir;

    const M1: &str = "6f9619ff-8b86-d011-b42d-00c04fc964ff";
    const M2: &str = "7f9619ff-8b86-d011-b42d-00c04fc964ff";
    const D1: &str = "1b4e28ba-2fa1-11d2-883f-0016d3cca427";

    #[tokio::test]
    async fn test_master_detail_round_trip() {
        let dir = TempDir::new().unwrap();
        let adapter = JetAdapter::new(dir.path());
        let report = adapter
            .create(&master_detail(), &CreateOptions::default())
            .await
            .unwrap();
        assert!(report.is_complete());
        assert_eq!(report.tables_created, 2);
        assert_eq!(report.primary_keys_created, 2);
        assert_eq!(report.relations_created, 1);

        let path = adapter.catalog_path("Xsd2DbTest").unwrap();
        let mut handle = CatalogHandle::open(&path).unwrap();
        let detail = handle.table("detail").unwrap();
        let fk = detail.foreign_keys().next().unwrap();
        assert_eq!(fk.name, "masterdetail");
        assert_eq!(fk.columns, vec!["masterid_fk"]);
        assert_eq!(fk.related_columns, vec!["masterid"]);

        handle.insert("master", &[("masterid", json!(M1))]).unwrap();
        handle
            .insert("detail", &[("detailid", json!(D1)), ("masterid_fk", json!(M1))])
            .unwrap();

        let fk_err = handle
            .insert("detail", &[("detailid", json!(M2)), ("masterid_fk", json!(M2))])
            .unwrap_err();
        assert_eq!(fk_err.engine_code(), Some(codes::RELATED_RECORD_REQUIRED));

        let pk_err = handle.insert("master", &[("masterid", json!(M1))]).unwrap_err();
        assert_eq!(pk_err.engine_code(), Some(codes::DUPLICATE_KEY));
        handle.close().unwrap();
    }

    #[tokio::test]
    async fn test_rerun_without_overwrite_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let adapter = JetAdapter::new(dir.path());
        let options = CreateOptions::default();
        adapter.create(&master_detail(), &options).await.unwrap();
        let report = adapter.create(&master_detail(), &options).await.unwrap();
        assert_eq!(report.tables_created, 2);
        assert_eq!(report.relations_created, 1);

        let handle = CatalogHandle::open(&adapter.catalog_path("Xsd2DbTest").unwrap()).unwrap();
        assert_eq!(handle.tables().len(), 2);
        handle.close().unwrap();
    }

    #[tokio::test]
    async fn test_overwrite_replaces_catalog() {
        let dir = TempDir::new().unwrap();
        let adapter = JetAdapter::new(dir.path());
        let schema = master_detail();
        adapter.create_database(&schema, false).await.unwrap();

        let path = adapter.catalog_path(&schema.name).unwrap();
        let mut handle = CatalogHandle::open(&path).unwrap();
        handle.append_table("stale", vec![]).unwrap();
        handle.close().unwrap();

        let options = CreateOptions {
            overwrite: true,
            ..CreateOptions::default()
        };
        adapter.create(&schema, &options).await.unwrap();
        let handle = CatalogHandle::open(&path).unwrap();
        assert!(handle.table("stale").is_none());
        handle.close().unwrap();
    }

    #[tokio::test]
    async fn test_empty_table_is_created_empty() {
        let dir = TempDir::new().unwrap();
        let adapter = JetAdapter::new(dir.path());
        let schema = master_detail().with_table(Table::new("Empty"));
        let report = adapter.create(&schema, &CreateOptions::default()).await.unwrap();
        assert!(report.is_complete());
        assert_eq!(report.tables_created, 3);
    }

    #[tokio::test]
    async fn test_use_existing_requires_catalog() {
        let dir = TempDir::new().unwrap();
        let adapter = JetAdapter::new(dir.path());
        let options = CreateOptions {
            use_existing: true,
            ..CreateOptions::default()
        };
        let err = adapter.create(&master_detail(), &options).await.unwrap_err();
        assert!(matches!(err, Xsd2DbError::Resource { .. }));
    }

    #[tokio::test]
    async fn test_prefix_and_isolation() {
        let dir = TempDir::new().unwrap();
        let adapter = JetAdapter::new(dir.path());
        let mut schema = master_detail();
        schema.tables[1]
            .columns
            .push(Column::unresolved("Broken", "xs:duration"));
        let options = CreateOptions {
            table_prefix: "App ".into(),
            ..CreateOptions::default()
        };
        let report = adapter.create(&schema, &options).await.unwrap();
        assert_eq!(report.tables_created, 1);
        assert_eq!(report.relations_created, 0);
        assert_eq!(report.skipped.len(), 2);

        let handle = CatalogHandle::open(&adapter.catalog_path(&schema.name).unwrap()).unwrap();
        assert!(handle.table("app_master").is_some());
        assert!(handle.table("app_master").unwrap().primary_key().is_some());
        handle.close().unwrap();
    }

    #[tokio::test]
    async fn test_duplicate_entities_keep_first_declaration() {
        let dir = TempDir::new().unwrap();
        let adapter = JetAdapter::new(dir.path());
        let mut schema = master_detail().with_table(
            Table::new("Master").with_column(Column::new("Other", ColumnType::Int32)),
        );
        schema.relations.push(schema.relations[0].clone());

        let report = adapter.create(&schema, &CreateOptions::default()).await.unwrap();
        assert_eq!(report.tables_created, 2);
        assert_eq!(report.primary_keys_created, 2);
        assert_eq!(report.relations_created, 1);
        assert_eq!(report.skipped.len(), 2);

        let handle = CatalogHandle::open(&adapter.catalog_path(&schema.name).unwrap()).unwrap();
        let master = handle.table("master").unwrap();
        assert!(master.primary_key().is_some());
        assert!(master.column("other").is_none());
        assert_eq!(handle.table("detail").unwrap().foreign_keys().count(), 1);
        handle.close().unwrap();
    }

    #[tokio::test]
    async fn test_lock_released_after_engine_error() {
        let dir = TempDir::new().unwrap();
        let adapter = JetAdapter::new(dir.path());
        let schema = Schema::new("Dup").with_table(
            Table::new("T")
                .with_column(Column::new("A", ColumnType::Int32))
                .with_column(Column::new("a", ColumnType::Int32)),
        );
        let err = adapter
            .create(&schema, &CreateOptions::default())
            .await
            .unwrap_err();
        assert!(err.engine_code().is_some());

        CatalogHandle::open(&adapter.catalog_path("Dup").unwrap())
            .unwrap()
            .close()
            .unwrap();
    }
}
