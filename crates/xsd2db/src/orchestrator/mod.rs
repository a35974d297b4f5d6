//! Create-run orchestrator.
//!
//! Loads the schema named by the configuration, applies the database-name
//! override and drives the configured adapter, or renders a script instead
//! of connecting.

use tracing::{info, warn};

use crate::compiler::{Compilation, ScriptCompiler};
use crate::config::Config;
use crate::core::engine::EngineKind;
use crate::core::schema::Schema;
use crate::core::traits::{CreateReport, DdlDialect, SchemaAdapter};
use crate::drivers::{AdapterImpl, MssqlDialect};
use crate::error::{Result, Xsd2DbError};
use crate::loader::load_schema;

/// Coordinates one create run.
#[derive(Debug)]
pub struct Orchestrator {
    config: Config,
    schema: Schema,
}

impl Orchestrator {
    /// Load the schema and prepare a run.
    pub fn new(config: Config) -> Result<Self> {
        config.target.engine.ensure_supported()?;

        let path = config
            .schema_file
            .as_ref()
            .ok_or_else(|| Xsd2DbError::argument("schema", "No schema file given"))?;
        let schema = load_schema(path)?;
        Self::with_schema(config, schema)
    }

    /// Prepare a run for an already loaded schema.
    pub fn with_schema(config: Config, mut schema: Schema) -> Result<Self> {
        config.target.engine.ensure_supported()?;
        if let Some(name) = &config.database {
            if name.trim().is_empty() {
                return Err(Xsd2DbError::argument("name", "The database name passed is empty"));
            }
            schema.name = name.clone();
        }
        Ok(Self { config, schema })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Create the database and schema on the target.
    ///
    /// Entities skipped by per-entity isolation are left in the report's
    /// failures; the caller decides how to surface them.
    pub async fn run(&self) -> Result<CreateReport> {
        self.config.validate()?;
        let adapter = AdapterImpl::from_config(&self.config.target)?;

        info!(
            "Creating {} on {} ({} tables, {} relations)",
            self.schema.name,
            adapter.engine(),
            self.schema.tables.len(),
            self.schema.relations.len()
        );

        let report = adapter.create(&self.schema, &self.config.create).await?;
        for skipped in &report.skipped {
            warn!("Skipped: {}", skipped);
        }
        Ok(report)
    }

    /// Compile the schema to a SQL script without connecting.
    pub fn script(&self) -> Result<(String, Compilation)> {
        if self.config.target.engine != EngineKind::Sql {
            return Err(Xsd2DbError::argument(
                "script",
                format!(
                    "Script output is only available for the sql engine, not {}",
                    self.config.target.engine
                ),
            ));
        }

        let dialect = MssqlDialect::new();
        let compilation =
            ScriptCompiler::new(&dialect, &self.config.create).compile_script(&self.schema);
        let script = compilation.to_script(dialect.batch_separator());
        Ok((script, compilation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::fixtures::master_detail;
    use crate::core::traits::DatabaseStep;

    #[test]
    fn test_name_override() {
        let mut config = Config::new(EngineKind::Sql);
        config.database = Some("Renamed".into());
        let orchestrator = Orchestrator::with_schema(config, master_detail()).unwrap();
        assert_eq!(orchestrator.schema().name, "Renamed");
    }

    #[test]
    fn test_oledb_rejected_before_loading() {
        let mut config = Config::new(EngineKind::OleDb);
        config.schema_file = Some("does-not-exist.xsd".into());
        assert!(Orchestrator::new(config).unwrap_err().is_argument());
    }

    #[test]
    fn test_missing_schema_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::new(EngineKind::Jet);
        config.schema_file = Some(dir.path().join("absent"));
        let err = Orchestrator::new(config).err().unwrap();
        assert_eq!(err.exit_code(), 6);
    }

    #[test]
    fn test_script_does_not_need_connection_settings() {
        let config = Config::new(EngineKind::Sql);
        let orchestrator = Orchestrator::with_schema(config, master_detail()).unwrap();
        let (script, compilation) = orchestrator.script().unwrap();
        assert!(compilation.is_complete());
        assert!(script.starts_with("IF DB_ID(N'Xsd2DbTest') IS NULL"));
        assert!(script.contains("USE [Xsd2DbTest];\nGO\n"));
        assert!(script.contains("FOREIGN KEY ([MasterID_FK])"));
    }

    #[test]
    fn test_script_requires_sql_engine() {
        let config = Config::new(EngineKind::Jet);
        let orchestrator = Orchestrator::with_schema(config, master_detail()).unwrap();
        assert!(orchestrator.script().unwrap_err().is_argument());
    }

    #[tokio::test]
    async fn test_run_sql_without_location_is_config_error() {
        let config = Config::new(EngineKind::Sql);
        let orchestrator = Orchestrator::with_schema(config, master_detail()).unwrap();
        let err = orchestrator.run().await.unwrap_err();
        assert!(matches!(err, Xsd2DbError::Config(_)));
    }

    #[tokio::test]
    async fn test_run_jet_in_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::new(EngineKind::Jet);
        config.target.location = Some(dir.path().display().to_string());
        let orchestrator = Orchestrator::with_schema(config, master_detail()).unwrap();

        let report = orchestrator.run().await.unwrap();
        assert_eq!(report.database_step, DatabaseStep::Created);
        assert_eq!(report.tables_created, 2);
        assert!(dir.path().join("xsd2dbtest.jet.json").is_file());
    }
}
