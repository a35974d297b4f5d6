//! Engine drivers.
//!
//! [`AdapterImpl`] dispatches to a concrete adapter without boxing.

pub mod jet;
pub mod mssql;

use async_trait::async_trait;

use crate::config::TargetConfig;
use crate::core::engine::EngineKind;
use crate::core::schema::Schema;
use crate::core::traits::{CreateOptions, CreateReport, SchemaAdapter};
use crate::error::{Result, Xsd2DbError};

pub use jet::{JetAdapter, JetDialect};
pub use mssql::{MssqlAdapter, MssqlDialect, TiberiusConnector};

/// Adapter for a configured target engine.
#[derive(Debug)]
pub enum AdapterImpl {
    Mssql(MssqlAdapter<TiberiusConnector>),
    Jet(JetAdapter),
}

impl AdapterImpl {
    /// Build the adapter for `target.engine`.
    pub fn from_config(target: &TargetConfig) -> Result<Self> {
        match target.engine {
            EngineKind::Sql => Ok(Self::Mssql(MssqlAdapter::from_config(target))),
            EngineKind::Jet => Ok(Self::Jet(JetAdapter::new(target.catalog_dir()))),
            EngineKind::OleDb => Err(Xsd2DbError::argument(
                "type",
                "The OleDb engine type is not supported",
            )),
        }
    }
}

#[async_trait]
impl SchemaAdapter for AdapterImpl {
    fn engine(&self) -> EngineKind {
        match self {
            Self::Mssql(a) => a.engine(),
            Self::Jet(a) => a.engine(),
        }
    }

    async fn create_database(&self, schema: &Schema, overwrite: bool) -> Result<()> {
        match self {
            Self::Mssql(a) => a.create_database(schema, overwrite).await,
            Self::Jet(a) => a.create_database(schema, overwrite).await,
        }
    }

    async fn create(&self, schema: &Schema, options: &CreateOptions) -> Result<CreateReport> {
        match self {
            Self::Mssql(a) => a.create(schema, options).await,
            Self::Jet(a) => a.create(schema, options).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_selects_engine() {
        let mut sql = TargetConfig::new(EngineKind::Sql);
        sql.location = Some("db.local".into());
        assert_eq!(AdapterImpl::from_config(&sql).unwrap().engine(), EngineKind::Sql);

        let jet = TargetConfig::new(EngineKind::Jet);
        assert_eq!(AdapterImpl::from_config(&jet).unwrap().engine(), EngineKind::Jet);
    }

    #[test]
    fn test_oledb_is_rejected() {
        let target = TargetConfig::new(EngineKind::OleDb);
        assert!(AdapterImpl::from_config(&target).unwrap_err().is_argument());
    }
}
