//! Jet catalog dialect: bare lowercase identifiers and native column types.

use crate::core::engine::EngineKind;
use crate::core::identifier::{sanitize_bare, SafeIdent, JET_MAX_IDENTIFIER_LENGTH};
use crate::core::schema::ColumnType;
use crate::core::traits::{Dialect, TypeMapping};
use crate::dialect::map_type;
use crate::error::Result;

/// Jet dialect implementation. There is no DDL text; see [`super::JetAdapter`].
#[derive(Debug, Clone, Default)]
pub struct JetDialect;

impl JetDialect {
    pub fn new() -> Self {
        Self
    }
}

impl Dialect for JetDialect {
    fn engine(&self) -> EngineKind {
        EngineKind::Jet
    }

    fn sanitize(&self, name: &str) -> Result<SafeIdent> {
        sanitize_bare(name, JET_MAX_IDENTIFIER_LENGTH)
    }

    fn map_type(
        &self,
        column_type: ColumnType,
        max_length: i32,
        nullable: bool,
    ) -> Result<TypeMapping> {
        map_type(column_type, max_length, nullable, EngineKind::Jet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::{Column, Table};
    use crate::core::traits::NativeDataType;

    #[test]
    fn test_sanitize_is_bare() {
        let dialect = JetDialect::new();
        assert_eq!(dialect.sanitize("Unique Text").unwrap().as_str(), "unique_text");
        assert_eq!(dialect.name(), "jet");
    }

    #[test]
    fn test_pk_column_is_not_nullable() {
        let table = Table::new("Master")
            .with_column(Column::new("MasterID", ColumnType::Guid))
            .with_primary_key(["MasterID"]);
        let mapping = JetDialect::new()
            .map_column(&table, &table.columns[0])
            .unwrap();
        let native = mapping.native().unwrap();
        assert_eq!(native.data_type, NativeDataType::Guid);
        assert!(!native.nullable);
    }
}
