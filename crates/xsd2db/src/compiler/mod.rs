//! Schema-to-DDL compiler.
//!
//! Walks a [`Schema`] and produces an ordered list of DDL statements:
//!
//! 1. create-database (optional, idempotent)
//! 2. one guarded create-table per table, in declared order
//! 3. one primary-key constraint per keyed table
//! 4. one foreign-key constraint per relation
//!
//! The pass order is a hard requirement: keys need their tables and
//! foreign keys need the referenced primary keys. Within a pass the
//! schema's declared order is kept so output is deterministic.
//!
//! Failures are isolated per entity. A table that fails validation or type
//! mapping is skipped together with its key and every relation touching it;
//! unrelated entities are still compiled and the failures are reported in
//! [`Compilation::failures`].

pub mod validator;

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, warn};

use crate::core::identifier::SafeIdent;
use crate::core::schema::{Relation, Schema, Table};
use crate::core::traits::{CreateOptions, DdlDialect};
use crate::error::{Result, Xsd2DbError};

pub use validator::{check, validate, Entity, ValidationMode, ValidationReport, Violation};

/// Kind of DDL statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    CreateDatabase,
    UseDatabase,
    CreateTable,
    PrimaryKey,
    ForeignKey,
}

/// One DDL statement and the entity it creates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Statement {
    pub kind: StatementKind,
    pub entity: String,
    pub sql: String,
}

/// Output of a compile run.
#[derive(Debug, Default)]
pub struct Compilation {
    pub statements: Vec<Statement>,
    /// Entities that were skipped, as argument or unsupported-type errors.
    pub failures: Vec<Xsd2DbError>,
    /// Warnings for lossy type mappings.
    pub warnings: Vec<String>,
}

impl Compilation {
    /// Statements of one kind, in emission order.
    pub fn of_kind(&self, kind: StatementKind) -> impl Iterator<Item = &Statement> {
        self.statements.iter().filter(move |s| s.kind == kind)
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Render the statements as a script, one batch per statement.
    pub fn to_script(&self, batch_separator: Option<&str>) -> String {
        let mut script = String::new();
        for statement in &self.statements {
            script.push_str(&statement.sql);
            script.push('\n');
            if let Some(separator) = batch_separator {
                script.push_str(separator);
                script.push('\n');
            }
        }
        script
    }
}

/// Compiles schemas into DDL for one dialect and one set of options.
pub struct ScriptCompiler<'a, D: DdlDialect> {
    dialect: &'a D,
    options: &'a CreateOptions,
}

impl<'a, D: DdlDialect> ScriptCompiler<'a, D> {
    pub fn new(dialect: &'a D, options: &'a CreateOptions) -> Self {
        Self { dialect, options }
    }

    /// Build the create-database statement for `database`.
    ///
    /// The table prefix is never applied to the database name.
    pub fn create_database(&self, database: &str) -> Result<Statement> {
        if database.trim().is_empty() {
            return Err(Xsd2DbError::argument(
                "databaseName",
                "The database name passed is empty",
            ));
        }
        let ident = self.dialect.sanitize(database)?;
        Ok(Statement {
            kind: StatementKind::CreateDatabase,
            entity: database.to_string(),
            sql: self
                .dialect
                .create_database_sql(&ident, self.options.overwrite),
        })
    }

    /// Compile tables, primary keys and relations.
    pub fn compile_schema(&self, schema: &Schema) -> Compilation {
        let mut out = Compilation::default();
        let report = check(schema, ValidationMode::Script);
        for failure in report.entity_errors() {
            warn!("Skipping invalid entity: {}", failure);
            out.failures.push(failure);
        }

        let mut created: Vec<usize> = Vec::new();

        for (index, table) in schema.tables.iter().enumerate() {
            if !report.table_is_valid(index) {
                continue;
            }
            match self.table_statement(table, &mut out.warnings) {
                Ok(statement) => {
                    debug!("Compiled table {}", table.name);
                    created.push(index);
                    out.statements.push(statement);
                }
                Err(e) => {
                    warn!("Skipping table {}: {}", table.name, e);
                    out.failures.push(e);
                }
            }
        }
        let created_names: HashSet<&str> = created
            .iter()
            .map(|&i| schema.tables[i].name.as_str())
            .collect();

        for table in created.iter().map(|&i| &schema.tables[i]) {
            if !table.has_pk() {
                continue;
            }
            match self.primary_key_statement(table) {
                Ok(statement) => out.statements.push(statement),
                Err(e) => out.failures.push(e.for_entity(&table.name)),
            }
        }

        for (index, relation) in schema.relations.iter().enumerate() {
            if !report.relation_is_valid(index) {
                continue;
            }
            if let Some(missing) = [&relation.parent_table, &relation.child_table]
                .into_iter()
                .find(|t| !created_names.contains(t.as_str()))
            {
                let e = Xsd2DbError::argument(
                    &relation.name,
                    format!("skipped because table {} was not created", missing),
                );
                warn!("{}", e);
                out.failures.push(e);
                continue;
            }
            match self.foreign_key_statement(relation) {
                Ok(statement) => out.statements.push(statement),
                Err(e) => out.failures.push(e.for_entity(&relation.name)),
            }
        }

        out
    }

    /// Compile the whole schema, including create-database unless
    /// `use_existing` is set.
    pub fn compile(&self, schema: &Schema) -> Compilation {
        let database = if self.options.use_existing {
            None
        } else {
            Some(self.create_database(&schema.name))
        };

        let mut out = self.compile_schema(schema);
        match database {
            Some(Ok(statement)) => out.statements.insert(0, statement),
            Some(Err(e)) => out.failures.insert(0, e),
            None => {}
        }
        out
    }

    fn qualified(&self, table_name: &str) -> Result<String> {
        let ident = self
            .dialect
            .sanitize(&format!("{}{}", self.options.table_prefix, table_name))?;
        self.dialect.qualify_table(&self.options.owner, &ident)
    }

    fn columns(&self, names: &[String]) -> Result<Vec<SafeIdent>> {
        names.iter().map(|c| self.dialect.sanitize(c)).collect()
    }

    fn table_statement(&self, table: &Table, warnings: &mut Vec<String>) -> Result<Statement> {
        let qualified = self
            .qualified(&table.name)
            .map_err(|e| e.for_entity(&table.name))?;

        let mut column_defs = Vec::with_capacity(table.columns.len());
        for column in &table.columns {
            let name = self
                .dialect
                .sanitize(&column.name)
                .map_err(|e| e.for_entity(&table.name))?;
            let mapping = self.dialect.map_column(table, column)?;
            if let Some(warning) = &mapping.warning {
                warn!("{}.{}: {}", table.name, column.name, warning);
                warnings.push(format!("{}.{}: {}", table.name, column.name, warning));
            }
            column_defs.push(format!("{} {}", name, mapping.descriptor));
        }

        Ok(Statement {
            kind: StatementKind::CreateTable,
            entity: table.name.clone(),
            sql: self.dialect.create_table_sql(&qualified, &column_defs),
        })
    }

    fn primary_key_statement(&self, table: &Table) -> Result<Statement> {
        let qualified = self.qualified(&table.name)?;
        let constraint = self
            .dialect
            .sanitize(&format!("PK_{}{}", self.options.table_prefix, table.name))?;
        let columns = self.columns(table.primary_key.as_deref().unwrap_or_default())?;

        Ok(Statement {
            kind: StatementKind::PrimaryKey,
            entity: table.name.clone(),
            sql: self
                .dialect
                .primary_key_sql(&qualified, &constraint, &columns),
        })
    }

    fn foreign_key_statement(&self, relation: &Relation) -> Result<Statement> {
        let child = self.qualified(&relation.child_table)?;
        let parent = self.qualified(&relation.parent_table)?;
        let constraint = self.dialect.sanitize(&relation.name)?;

        Ok(Statement {
            kind: StatementKind::ForeignKey,
            entity: relation.name.clone(),
            sql: self.dialect.foreign_key_sql(
                &child,
                &constraint,
                &self.columns(&relation.child_columns)?,
                &parent,
                &self.columns(&relation.parent_columns)?,
            ),
        })
    }

    /// Compile a standalone script: [`ScriptCompiler::compile`] plus the
    /// statement that switches the session into the target database.
    pub fn compile_script(&self, schema: &Schema) -> Compilation {
        let mut out = self.compile(schema);
        let use_database = self
            .dialect
            .sanitize(&schema.name)
            .ok()
            .and_then(|ident| self.dialect.use_database_sql(&ident));

        if let Some(sql) = use_database {
            let at = out
                .statements
                .iter()
                .position(|s| s.kind != StatementKind::CreateDatabase)
                .unwrap_or(out.statements.len());
            out.statements.insert(
                at,
                Statement {
                    kind: StatementKind::UseDatabase,
                    entity: schema.name.clone(),
                    sql,
                },
            );
        }
        out
    }
}

/// Compile `schema` for `dialect` with `options`.
pub fn compile<D: DdlDialect>(schema: &Schema, dialect: &D, options: &CreateOptions) -> Compilation {
    ScriptCompiler::new(dialect, options).compile(schema)
}
