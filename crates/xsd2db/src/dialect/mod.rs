//! Type mapping between the abstract schema model and target engines.
//!
//! [`map_type`] is a pure function keyed by column type and engine. Engine
//! dialects in [`crate::drivers`] delegate to it.
//!
//! ```rust,ignore
//! let mapping = map_type(ColumnType::String, 80, true, EngineKind::Sql)?;
//! assert_eq!(mapping.sql(), Some("varchar(80) NULL"));
//! ```

mod typemap;

pub use typemap::map_type;
