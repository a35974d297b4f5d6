//! Jet (file-based desktop catalog) driver.
//!
//! - [`JetDialect`]: bare identifiers and native column types
//! - [`CatalogHandle`]: exclusive handle on a catalog file
//! - [`JetAdapter`]: schema creation through catalog primitives

mod adapter;
pub mod catalog;
mod dialect;

pub use adapter::JetAdapter;
pub use catalog::{CatalogHandle, CatalogKey, CatalogTable};
pub use dialect::JetDialect;
