//! Core abstractions: schema model, identifiers, engines and adapter traits.

pub mod engine;
pub mod identifier;
pub mod schema;
pub mod traits;

pub use engine::EngineKind;
pub use identifier::{sanitize, SafeIdent};
pub use schema::{Column, ColumnType, Relation, Schema, Table};
pub use traits::{
    CreateOptions, CreateReport, DatabaseStep, DdlDialect, Dialect, NativeDataType, NativeType,
    SchemaAdapter, TypeDescriptor, TypeMapping,
};
