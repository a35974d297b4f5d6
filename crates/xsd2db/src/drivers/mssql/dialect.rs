//! SQL Server DDL dialect (Strategy pattern).
//!
//! Bracket-quoted identifiers, `sys` catalog existence guards and the
//! fixed cascade rules for foreign keys.

use crate::core::engine::EngineKind;
use crate::core::identifier::{escape_literal, sanitize_mssql, SafeIdent};
use crate::core::schema::ColumnType;
use crate::core::traits::{DdlDialect, Dialect, TypeMapping};
use crate::dialect::map_type;
use crate::error::Result;

/// Microsoft SQL Server dialect implementation.
#[derive(Debug, Clone, Default)]
pub struct MssqlDialect;

impl MssqlDialect {
    /// Create a new MSSQL dialect instance.
    pub fn new() -> Self {
        Self
    }
}

impl Dialect for MssqlDialect {
    fn engine(&self) -> EngineKind {
        EngineKind::Sql
    }

    fn sanitize(&self, name: &str) -> Result<SafeIdent> {
        sanitize_mssql(name)
    }

    fn map_type(
        &self,
        column_type: ColumnType,
        max_length: i32,
        nullable: bool,
    ) -> Result<TypeMapping> {
        map_type(column_type, max_length, nullable, EngineKind::Sql)
    }
}

impl DdlDialect for MssqlDialect {
    fn create_database_sql(&self, database: &SafeIdent, overwrite: bool) -> String {
        let literal = escape_literal(database.bare());
        if overwrite {
            format!(
                "IF DB_ID(N'{0}') IS NOT NULL\nBEGIN\n    ALTER DATABASE {1} SET SINGLE_USER WITH ROLLBACK IMMEDIATE;\n    DROP DATABASE {1};\nEND;\nCREATE DATABASE {1};",
                literal, database
            )
        } else {
            format!(
                "IF DB_ID(N'{}') IS NULL\n    CREATE DATABASE {};",
                literal, database
            )
        }
    }

    fn qualify_table(&self, owner: &str, table: &SafeIdent) -> Result<String> {
        if owner.trim().is_empty() {
            return Ok(table.to_string());
        }
        Ok(format!("{}.{}", sanitize_mssql(owner)?, table))
    }

    fn create_table_sql(&self, qualified_table: &str, column_defs: &[String]) -> String {
        let literal = escape_literal(qualified_table);
        format!(
            "DECLARE @drop_fk nvarchar(max) = N'';\n\
             SELECT @drop_fk += N'ALTER TABLE ' + QUOTENAME(OBJECT_SCHEMA_NAME(fk.parent_object_id)) + N'.' + QUOTENAME(OBJECT_NAME(fk.parent_object_id)) + N' DROP CONSTRAINT ' + QUOTENAME(fk.name) + N';'\n\
             FROM sys.foreign_keys fk WHERE fk.referenced_object_id = OBJECT_ID(N'{0}', N'U');\n\
             EXEC sp_executesql @drop_fk;\n\
             IF OBJECT_ID(N'{0}', N'U') IS NOT NULL DROP TABLE {1};\n\
             CREATE TABLE {1} (\n    {2}\n);",
            literal,
            qualified_table,
            column_defs.join(",\n    ")
        )
    }

    fn primary_key_sql(
        &self,
        qualified_table: &str,
        constraint: &SafeIdent,
        columns: &[SafeIdent],
    ) -> String {
        format!(
            "ALTER TABLE {} WITH NOCHECK ADD CONSTRAINT {} PRIMARY KEY CLUSTERED ({});",
            qualified_table,
            constraint,
            join(columns)
        )
    }

    fn foreign_key_sql(
        &self,
        qualified_child: &str,
        constraint: &SafeIdent,
        child_columns: &[SafeIdent],
        qualified_parent: &str,
        parent_columns: &[SafeIdent],
    ) -> String {
        format!(
            "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE CASCADE ON UPDATE NO ACTION;",
            qualified_child,
            constraint,
            join(child_columns),
            qualified_parent,
            join(parent_columns)
        )
    }

    fn use_database_sql(&self, database: &SafeIdent) -> Option<String> {
        Some(format!("USE {};", database))
    }

    fn batch_separator(&self) -> Option<&str> {
        Some("GO")
    }
}

fn join(columns: &[SafeIdent]) -> String {
    columns
        .iter()
        .map(SafeIdent::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str) -> SafeIdent {
        sanitize_mssql(name).unwrap()
    }

    #[test]
    fn test_create_database_skips_existing() {
        let sql = MssqlDialect::new().create_database_sql(&ident("Shop"), false);
        assert!(sql.contains("IF DB_ID(N'Shop') IS NULL"));
        assert!(sql.contains("CREATE DATABASE [Shop];"));
        assert!(!sql.contains("DROP DATABASE"));
    }

    #[test]
    fn test_create_database_overwrite_drops_first() {
        let sql = MssqlDialect::new().create_database_sql(&ident("Test-Database"), true);
        let drop = sql.find("DROP DATABASE [Test-Database]").unwrap();
        let create = sql.find("CREATE DATABASE [Test-Database]").unwrap();
        assert!(drop < create);
        assert!(sql.contains("IF DB_ID(N'Test-Database') IS NOT NULL"));
    }

    #[test]
    fn test_create_database_escapes_quotes_in_literal() {
        let sql = MssqlDialect::new().create_database_sql(&ident("O'Brien"), false);
        assert!(sql.contains("N'O''Brien'"));
        assert!(sql.contains("[O'Brien]"));
    }

    #[test]
    fn test_qualify_table() {
        let dialect = MssqlDialect::new();
        assert_eq!(dialect.qualify_table("dbo", &ident("Master")).unwrap(), "[dbo].[Master]");
        assert_eq!(dialect.qualify_table("", &ident("Master")).unwrap(), "[Master]");
    }

    #[test]
    fn test_create_table_is_guarded() {
        let sql = MssqlDialect::new().create_table_sql(
            "[dbo].[Master]",
            &["[MasterID] uniqueidentifier NOT NULL".to_string()],
        );
        assert!(sql.contains("IF OBJECT_ID(N'[dbo].[Master]', N'U') IS NOT NULL DROP TABLE [dbo].[Master];"));
        assert!(sql.contains("CREATE TABLE [dbo].[Master] (\n    [MasterID] uniqueidentifier NOT NULL\n);"));
        assert!(sql.find("sys.foreign_keys").unwrap() < sql.find("DROP TABLE").unwrap());
    }

    #[test]
    fn test_foreign_key_has_fixed_rules() {
        let sql = MssqlDialect::new().foreign_key_sql(
            "[dbo].[Detail]",
            &ident("MasterDetail"),
            &[ident("MasterID_FK")],
            "[dbo].[Master]",
            &[ident("MasterID")],
        );
        assert_eq!(
            sql,
            "ALTER TABLE [dbo].[Detail] ADD CONSTRAINT [MasterDetail] FOREIGN KEY ([MasterID_FK]) REFERENCES [dbo].[Master] ([MasterID]) ON DELETE CASCADE ON UPDATE NO ACTION;"
        );
    }
}
