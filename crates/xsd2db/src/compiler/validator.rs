//! Structural validation of a schema before DDL generation.
//!
//! Every check names the offending entity so the compiler can skip exactly
//! that entity and keep going with its siblings.

use std::collections::HashSet;

use crate::core::identifier::validate_identifier;
use crate::core::schema::{Schema, Table};
use crate::error::Xsd2DbError;

/// Which realization the schema is validated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    /// Script path: tables without columns are rejected.
    Script,
    /// Native catalog path: tables without columns are created empty.
    Catalog,
}

/// The entity a violation is about.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Entity {
    Schema(String),
    Table(String),
    Relation(String),
}

impl Entity {
    pub fn name(&self) -> &str {
        match self {
            Entity::Schema(name) | Entity::Table(name) | Entity::Relation(name) => name,
        }
    }
}

/// A structural defect in one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub entity: Entity,
    pub message: String,
}

impl Violation {
    fn table(table: &Table, message: impl Into<String>) -> Self {
        Self {
            entity: Entity::Table(table.name.clone()),
            message: message.into(),
        }
    }

    fn relation(name: &str, message: impl Into<String>) -> Self {
        Self {
            entity: Entity::Relation(name.to_string()),
            message: message.into(),
        }
    }
}

impl From<Violation> for Xsd2DbError {
    fn from(v: Violation) -> Self {
        Xsd2DbError::argument(v.entity.name(), v.message)
    }
}

/// Summary of a validation pass, indexed for the compiler.
///
/// Tables and relations are keyed by their position in the schema, so a
/// repeated name only invalidates the later declaration.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub violations: Vec<Violation>,
    invalid_tables: HashSet<usize>,
    invalid_relations: HashSet<usize>,
    schema_name_invalid: bool,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    /// Whether the table at `index` in `schema.tables` passed validation.
    pub fn table_is_valid(&self, index: usize) -> bool {
        !self.invalid_tables.contains(&index)
    }

    /// Whether the relation at `index` in `schema.relations` passed validation.
    pub fn relation_is_valid(&self, index: usize) -> bool {
        !self.invalid_relations.contains(&index)
    }

    pub fn schema_name_is_valid(&self) -> bool {
        !self.schema_name_invalid
    }

    /// Violations for tables and relations, as argument errors.
    pub fn entity_errors(&self) -> impl Iterator<Item = Xsd2DbError> + '_ {
        self.violations
            .iter()
            .filter(|v| !matches!(v.entity, Entity::Schema(_)))
            .cloned()
            .map(Xsd2DbError::from)
    }

    fn push(&mut self, index: usize, violation: Violation) {
        match &violation.entity {
            Entity::Schema(_) => self.schema_name_invalid = true,
            Entity::Table(_) => {
                self.invalid_tables.insert(index);
            }
            Entity::Relation(_) => {
                self.invalid_relations.insert(index);
            }
        }
        self.violations.push(violation);
    }
}

/// Validate a schema, returning every violation found.
pub fn validate(schema: &Schema, mode: ValidationMode) -> Vec<Violation> {
    check(schema, mode).violations
}

/// Validate a schema into an indexed report.
pub fn check(schema: &Schema, mode: ValidationMode) -> ValidationReport {
    let mut report = ValidationReport::default();

    if schema.name.trim().is_empty() {
        report.push(
            0,
            Violation {
                entity: Entity::Schema(schema.name.clone()),
                message: "The database name passed is empty".to_string(),
            },
        );
    }

    let mut seen_tables = HashSet::new();
    for (index, table) in schema.tables.iter().enumerate() {
        if validate_identifier(&table.name).is_err() {
            report.push(index, Violation::table(table, "invalid table name"));
            continue;
        }
        if !seen_tables.insert(table.name.as_str()) {
            report.push(index, Violation::table(table, "Table is declared more than once"));
            continue;
        }
        if let Some(message) = check_table(table, mode) {
            report.push(index, Violation::table(table, message));
        }
    }

    let mut seen_relations = HashSet::new();
    for (index, relation) in schema.relations.iter().enumerate() {
        let message = if !seen_relations.insert(relation.name.as_str()) {
            Some("Relationship is declared more than once".to_string())
        } else {
            check_relation(schema, relation)
        };
        if let Some(message) = message {
            report.push(index, Violation::relation(&relation.name, message));
        }
    }

    report
}

fn check_table(table: &Table, mode: ValidationMode) -> Option<String> {
    if table.columns.is_empty() && mode == ValidationMode::Script {
        return Some("Table does not contain any columns".to_string());
    }

    let mut seen = HashSet::new();
    for column in &table.columns {
        if validate_identifier(&column.name).is_err() {
            return Some(format!("invalid column name {:?}", column.name));
        }
        if !seen.insert(column.name.as_str()) {
            return Some(format!("Column {} is declared more than once", column.name));
        }
        if column.column_type.is_none() {
            return Some(format!(
                "cannot resolve type '{}' of column {}",
                column.source_type.as_deref().unwrap_or("?"),
                column.name
            ));
        }
    }

    if let Some(pk) = &table.primary_key {
        if pk.is_empty() {
            return Some("Primary key has an empty column list".to_string());
        }
        if let Some(missing) = pk.iter().find(|c| table.column(c).is_none()) {
            return Some(format!("Primary key column {} does not exist", missing));
        }
    }

    None
}

fn check_relation(schema: &Schema, relation: &crate::core::schema::Relation) -> Option<String> {
    if validate_identifier(&relation.name).is_err() {
        return Some("invalid relation name".to_string());
    }
    if relation.parent_columns.is_empty() || relation.child_columns.is_empty() {
        return Some("Relationship has an empty column list".to_string());
    }
    if relation.parent_columns.len() != relation.child_columns.len() {
        return Some(format!(
            "Relationship pairs {} parent columns with {} child columns",
            relation.parent_columns.len(),
            relation.child_columns.len()
        ));
    }

    for (side, table_name, columns) in [
        ("parent", &relation.parent_table, &relation.parent_columns),
        ("child", &relation.child_table, &relation.child_columns),
    ] {
        let Some(table) = schema.table(table_name) else {
            return Some(format!("{} table {} does not exist", side, table_name));
        };
        if let Some(missing) = columns.iter().find(|c| table.column(c).is_none()) {
            return Some(format!(
                "{} column {}.{} does not exist",
                side, table_name, missing
            ));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::fixtures::master_detail;
    use crate::core::schema::{Column, ColumnType, Relation};

    #[test]
    fn test_valid_schema_has_no_violations() {
        assert!(validate(&master_detail(), ValidationMode::Script).is_empty());
    }

    #[test]
    fn test_empty_schema_name() {
        let mut schema = master_detail();
        schema.name = "  ".to_string();
        let report = check(&schema, ValidationMode::Script);
        assert!(!report.schema_name_is_valid());
        assert!(report.table_is_valid(0));
        assert_eq!(report.entity_errors().count(), 0);
    }

    #[test]
    fn test_empty_table_depends_on_mode() {
        let schema = master_detail().with_table(Table::new("Empty"));

        let script = check(&schema, ValidationMode::Script);
        assert!(!script.table_is_valid(2));
        assert!(script.table_is_valid(0));
        assert_eq!(script.violations[0].entity, Entity::Table("Empty".into()));
        assert!(script.violations[0].message.contains("does not contain any columns"));

        assert!(check(&schema, ValidationMode::Catalog).is_valid());
    }

    #[test]
    fn test_empty_primary_key() {
        let schema = Schema::new("S").with_table(
            Table::new("T")
                .with_column(Column::new("A", ColumnType::Int32))
                .with_primary_key(Vec::<String>::new()),
        );
        let violations = validate(&schema, ValidationMode::Catalog);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].message.contains("empty column list"));
    }

    #[test]
    fn test_primary_key_unknown_column() {
        let schema = Schema::new("S").with_table(
            Table::new("T")
                .with_column(Column::new("A", ColumnType::Int32))
                .with_primary_key(["B"]),
        );
        assert!(validate(&schema, ValidationMode::Script)[0]
            .message
            .contains("B does not exist"));
    }

    #[test]
    fn test_unresolved_column_type() {
        let schema = Schema::new("S").with_table(
            Table::new("T").with_column(Column::unresolved("Odd", "xs:duration")),
        );
        let violations = validate(&schema, ValidationMode::Script);
        assert_eq!(violations[0].entity, Entity::Table("T".into()));
        assert!(violations[0].message.contains("xs:duration"));
    }

    #[test]
    fn test_relation_column_lists() {
        let schema = master_detail()
            .with_relation(Relation::new("NoCols", "Master", vec![], "Detail", vec![]))
            .with_relation(Relation::new(
                "Uneven",
                "Master",
                vec!["MasterID".into()],
                "Detail",
                vec!["MasterID_FK".into(), "DetailID".into()],
            ))
            .with_relation(Relation::new(
                "Dangling",
                "Nowhere",
                vec!["X".into()],
                "Detail",
                vec!["MasterID_FK".into()],
            ));

        let report = check(&schema, ValidationMode::Script);
        assert!(report.relation_is_valid(0));
        assert!(!report.relation_is_valid(1));
        assert!(!report.relation_is_valid(2));
        assert!(!report.relation_is_valid(3));
        assert_eq!(report.violations.len(), 3);
    }

    #[test]
    fn test_duplicate_table() {
        let schema = master_detail().with_table(
            Table::new("Master").with_column(Column::new("Other", ColumnType::Int32)),
        );
        let report = check(&schema, ValidationMode::Script);
        assert_eq!(report.violations.len(), 1);
        assert!(report.violations[0].message.contains("more than once"));
        assert!(report.table_is_valid(0));
        assert!(!report.table_is_valid(2));
    }

    #[test]
    fn test_duplicate_relation_keeps_first() {
        let mut schema = master_detail();
        schema.relations.push(schema.relations[0].clone());
        let report = check(&schema, ValidationMode::Script);
        assert_eq!(report.violations.len(), 1);
        assert_eq!(report.violations[0].entity, Entity::Relation("MasterDetail".into()));
        assert!(report.relation_is_valid(0));
        assert!(!report.relation_is_valid(1));
    }
}
