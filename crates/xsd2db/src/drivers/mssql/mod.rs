//! SQL Server driver.

mod adapter;
mod dialect;

pub use adapter::{Connector, MssqlAdapter, SqlConnection, TiberiusConnection, TiberiusConnector};
pub use dialect::MssqlDialect;
