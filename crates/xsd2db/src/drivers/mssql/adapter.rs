//! Script-based SQL Server adapter.
//!
//! Runs the create-database statement on an administrative connection, then
//! opens a second connection bound to the new catalog for the table, key and
//! relation statements. Each connection is closed on every exit path.

use std::time::Duration;

use async_trait::async_trait;
use tiberius::{AuthMethod, Client, Config, EncryptionLevel};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info};

use crate::compiler::{ScriptCompiler, StatementKind};
use crate::config::TargetConfig;
use crate::core::engine::EngineKind;
use crate::core::schema::Schema;
use crate::core::traits::{CreateOptions, CreateReport, DatabaseStep, Dialect, SchemaAdapter};
use crate::error::{Result, Xsd2DbError};

use super::dialect::MssqlDialect;

/// A connection that runs DDL batches.
#[async_trait]
pub trait SqlConnection: Send {
    /// Execute one batch. Engine rejections surface as [`Xsd2DbError::Engine`].
    async fn execute(&mut self, sql: &str) -> Result<()>;

    /// Close the connection.
    async fn close(self) -> Result<()>;
}

/// Opens connections to a server.
#[async_trait]
pub trait Connector: Send + Sync {
    type Connection: SqlConnection;

    /// Connect to `catalog`, or to the administrative context when `None`.
    async fn connect(&self, catalog: Option<&str>) -> Result<Self::Connection>;
}

/// Run `sql` and close `conn`, reporting the first failure.
async fn execute_and_close<C: SqlConnection>(mut conn: C, sql: &str) -> Result<()> {
    let executed = conn.execute(sql).await;
    let closed = conn.close().await;
    executed?;
    closed
}

/// Tiberius-backed connector for SQL Server.
#[derive(Debug, Clone)]
pub struct TiberiusConnector {
    config: TargetConfig,
}

impl TiberiusConnector {
    pub fn new(config: TargetConfig) -> Self {
        Self { config }
    }

    fn build_config(&self, catalog: Option<&str>) -> Config {
        let mut config = Config::new();
        config.host(self.config.location.as_deref().unwrap_or("localhost"));
        config.port(self.config.port);
        if let Some(catalog) = catalog {
            config.database(catalog);
        }
        config.authentication(AuthMethod::sql_server(
            &self.config.user,
            &self.config.password,
        ));

        if self.config.trust_server_cert {
            config.trust_cert();
        }

        if self.config.encrypt {
            config.encryption(EncryptionLevel::Required);
        } else {
            config.encryption(EncryptionLevel::NotSupported);
        }

        config
    }

    fn context(&self, catalog: Option<&str>) -> String {
        format!(
            "connecting to {}:{} ({})",
            self.config.location.as_deref().unwrap_or("localhost"),
            self.config.port,
            catalog.unwrap_or("master")
        )
    }
}

/// A tiberius client connection.
pub struct TiberiusConnection {
    client: Client<Compat<TcpStream>>,
}

#[async_trait]
impl SqlConnection for TiberiusConnection {
    async fn execute(&mut self, sql: &str) -> Result<()> {
        self.client.simple_query(sql).await?.into_results().await?;
        Ok(())
    }

    async fn close(self) -> Result<()> {
        self.client
            .close()
            .await
            .map_err(|e| Xsd2DbError::resource(e.to_string(), "closing SQL Server connection"))
    }
}

#[async_trait]
impl Connector for TiberiusConnector {
    type Connection = TiberiusConnection;

    async fn connect(&self, catalog: Option<&str>) -> Result<TiberiusConnection> {
        let config = self.build_config(catalog);
        let context = self.context(catalog);
        let timeout = Duration::from_secs(self.config.connect_timeout_secs);

        let connect = async {
            let tcp = TcpStream::connect(config.get_addr())
                .await
                .map_err(|e| Xsd2DbError::resource(e.to_string(), context.clone()))?;
            tcp.set_nodelay(true)
                .map_err(|e| Xsd2DbError::resource(e.to_string(), context.clone()))?;
            Client::connect(config, tcp.compat_write())
                .await
                .map_err(|e| Xsd2DbError::resource(e.to_string(), context.clone()))
        };

        let client = tokio::time::timeout(timeout, connect)
            .await
            .map_err(|_| {
                Xsd2DbError::resource(
                    format!("timed out after {}s", timeout.as_secs()),
                    context.clone(),
                )
            })??;

        debug!("Connected: {}", context);
        Ok(TiberiusConnection { client })
    }
}

/// Creates schemas on SQL Server through generated DDL.
#[derive(Debug)]
pub struct MssqlAdapter<C: Connector> {
    connector: C,
    dialect: MssqlDialect,
}

impl MssqlAdapter<TiberiusConnector> {
    /// Adapter connecting with tiberius using `config`.
    pub fn from_config(config: &TargetConfig) -> Self {
        Self::new(TiberiusConnector::new(config.clone()))
    }
}

impl<C: Connector> MssqlAdapter<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            dialect: MssqlDialect::new(),
        }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    fn catalog_name(&self, schema: &Schema) -> Result<String> {
        if schema.name.trim().is_empty() {
            return Err(Xsd2DbError::argument(
                "databaseName",
                "The database name passed is empty",
            ));
        }
        Ok(self.dialect.sanitize(&schema.name)?.bare().to_string())
    }
}

#[async_trait]
impl<C: Connector> SchemaAdapter for MssqlAdapter<C> {
    fn engine(&self) -> EngineKind {
        EngineKind::Sql
    }

    async fn create_database(&self, schema: &Schema, overwrite: bool) -> Result<()> {
        let options = CreateOptions {
            overwrite,
            ..CreateOptions::default()
        };
        let statement = ScriptCompiler::new(&self.dialect, &options).create_database(&schema.name)?;

        let conn = self.connector.connect(None).await?;
        debug!("Executing: {}", statement.sql);
        execute_and_close(conn, &statement.sql).await?;
        info!("Database {} is ready", schema.name);
        Ok(())
    }

    async fn create(&self, schema: &Schema, options: &CreateOptions) -> Result<CreateReport> {
        let catalog = self.catalog_name(schema)?;

        let step = if options.use_existing {
            info!("Using existing database {}", catalog);
            DatabaseStep::UsedExisting
        } else {
            self.create_database(schema, options.overwrite).await?;
            DatabaseStep::Created
        };
        let mut report = CreateReport::new(EngineKind::Sql, &catalog, step);
        if step == DatabaseStep::Created {
            report.statements_executed += 1;
        }

        let compilation = ScriptCompiler::new(&self.dialect, options).compile_schema(schema);
        for failure in compilation.failures {
            report.skip(failure);
        }

        let mut conn = self.connector.connect(Some(&catalog)).await?;
        for statement in &compilation.statements {
            debug!("Executing: {}", statement.sql);
            if let Err(e) = conn.execute(&statement.sql).await {
                // The engine error wins over a failure to close.
                let _ = conn.close().await;
                return Err(e);
            }
            report.statements_executed += 1;
            match statement.kind {
                StatementKind::CreateTable => report.tables_created += 1,
                StatementKind::PrimaryKey => report.primary_keys_created += 1,
                StatementKind::ForeignKey => report.relations_created += 1,
                StatementKind::CreateDatabase | StatementKind::UseDatabase => {}
            }
        }
        conn.close().await?;

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
