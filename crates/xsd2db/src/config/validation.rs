//! Configuration validation.

use super::Config;
use crate::core::engine::EngineKind;
use crate::error::{Result, Xsd2DbError};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    let target = &config.target;

    if target.engine == EngineKind::OleDb {
        return Err(Xsd2DbError::Config(
            "target.type 'oledb' is not supported (use 'sql' or 'jet')".into(),
        ));
    }

    if target.engine.requires_location()
        && target.location.as_deref().map_or(true, |l| l.trim().is_empty())
    {
        return Err(Xsd2DbError::Config(format!(
            "target.location (server host) is required for type '{}'",
            target.engine
        )));
    }

    if target.engine == EngineKind::Sql {
        if target.port == 0 {
            return Err(Xsd2DbError::Config("target.port must be non-zero".into()));
        }
        if target.user.trim().is_empty() {
            return Err(Xsd2DbError::Config(
                "target.user is required for type 'sql'".into(),
            ));
        }
    }

    if target.connect_timeout_secs == 0 {
        return Err(Xsd2DbError::Config(
            "target.connect_timeout_secs must be at least 1".into(),
        ));
    }

    if let Some(database) = &config.database {
        if database.trim().is_empty() {
            return Err(Xsd2DbError::Config("database must not be empty".into()));
        }
    }

    Ok(())
}
