//! Abstract column type to engine type mapping.
//!
//! A fixed lookup keyed by [`ColumnType`] and [`EngineKind`]. Script engines
//! get a DDL token with its NULL clause; native catalogs get a
//! [`NativeType`] carrying the defined size.
//!
//! ## Known lossy mappings (SQL Server)
//!
//! | Abstract   | Target     | Loss                                    |
//! |------------|------------|-----------------------------------------|
//! | `Decimal`  | `real`     | 28-digit decimal narrowed to 4-byte float |
//! | `UInt64`   | `bigint`   | values above `i64::MAX`                 |
//! | `UInt32`   | `int`      | values above `i32::MAX`                 |
//! | `UInt16`   | `smallint` | values above `i16::MAX`                 |
//! | `TimeSpan` | `int`      | stored as a plain integer               |

use crate::core::engine::EngineKind;
use crate::core::schema::ColumnType;
use crate::core::traits::{NativeDataType, NativeType, TypeDescriptor, TypeMapping};
use crate::error::{Result, Xsd2DbError};

/// Longest fixed-width `varchar`/`varbinary` on SQL Server.
const MSSQL_MAX_FIXED_LENGTH: i32 = 8000;

/// Longest fixed-width text column on a Jet catalog.
const JET_MAX_WCHAR_LENGTH: i32 = 255;

/// Map an abstract type and its facets to a type descriptor for `engine`.
///
/// # Errors
///
/// Returns [`Xsd2DbError::UnsupportedType`] when no mapping exists for the
/// (type, engine) pair. Table and column are left empty for the caller to fill.
pub fn map_type(
    column_type: ColumnType,
    max_length: i32,
    nullable: bool,
    engine: EngineKind,
) -> Result<TypeMapping> {
    match engine {
        EngineKind::Sql => map_mssql(column_type, max_length, nullable),
        EngineKind::Jet => map_jet(column_type, max_length, nullable),
        EngineKind::OleDb => Err(unsupported(column_type, engine)),
    }
}

fn unsupported(column_type: ColumnType, engine: EngineKind) -> Xsd2DbError {
    Xsd2DbError::UnsupportedType {
        table: String::new(),
        column: String::new(),
        type_name: column_type.type_name().to_string(),
        engine: engine.name().to_string(),
    }
}

fn map_mssql(column_type: ColumnType, max_length: i32, nullable: bool) -> Result<TypeMapping> {
    let null_clause = if nullable { "NULL" } else { "NOT NULL" };
    let token = |base: &str| TypeDescriptor::Sql(format!("{} {}", base, null_clause));

    let mapping = match column_type {
        ColumnType::Int64 => TypeMapping::lossless(token("bigint")),
        ColumnType::UInt64 => TypeMapping::lossy(
            token("bigint"),
            "UInt64 stored as signed bigint; values above 9223372036854775807 overflow",
        ),
        ColumnType::Int32 => TypeMapping::lossless(token("int")),
        ColumnType::UInt32 => TypeMapping::lossy(
            token("int"),
            "UInt32 stored as signed int; values above 2147483647 overflow",
        ),
        ColumnType::Int16 => TypeMapping::lossless(token("smallint")),
        ColumnType::UInt16 => TypeMapping::lossy(
            token("smallint"),
            "UInt16 stored as signed smallint; values above 32767 overflow",
        ),
        ColumnType::Byte => TypeMapping::lossless(token("tinyint")),
        ColumnType::Boolean => TypeMapping::lossless(token("bit")),
        ColumnType::Char => TypeMapping::lossless(token("char")),
        ColumnType::DateTime => TypeMapping::lossless(token("datetime")),
        ColumnType::Double => TypeMapping::lossless(token("float")),
        ColumnType::Decimal => TypeMapping::lossy(
            token("real"),
            "Decimal narrowed to real; precision beyond 7 digits is lost",
        ),
        ColumnType::Guid => TypeMapping::lossless(token("uniqueidentifier")),
        ColumnType::TimeSpan => {
            TypeMapping::lossy(token("int"), "TimeSpan stored as a plain int")
        }
        ColumnType::String => {
            let base = if max_length < 1 {
                "text".to_string()
            } else if max_length > MSSQL_MAX_FIXED_LENGTH {
                "varchar(max)".to_string()
            } else {
                format!("varchar({})", max_length)
            };
            TypeMapping::lossless(token(&base))
        }
        ColumnType::Binary => {
            let base = if !(1..=MSSQL_MAX_FIXED_LENGTH).contains(&max_length) {
                "varbinary(max)".to_string()
            } else {
                format!("varbinary({})", max_length)
            };
            TypeMapping::lossless(token(&base))
        }
        ColumnType::CharBlob => return Err(unsupported(column_type, EngineKind::Sql)),
    };

    Ok(mapping)
}

fn map_jet(column_type: ColumnType, max_length: i32, nullable: bool) -> Result<TypeMapping> {
    let (data_type, defined_size) = match column_type {
        ColumnType::Int64 => (NativeDataType::BigInt, 8),
        ColumnType::UInt64 => (NativeDataType::UnsignedBigInt, 8),
        ColumnType::Int32 => (NativeDataType::Integer, 4),
        ColumnType::UInt32 => (NativeDataType::UnsignedInt, 4),
        ColumnType::Int16 => (NativeDataType::SmallInt, 2),
        ColumnType::UInt16 => (NativeDataType::UnsignedSmallInt, 2),
        ColumnType::Byte => (NativeDataType::TinyInt, 1),
        ColumnType::Boolean => (NativeDataType::Boolean, 2),
        ColumnType::Char => (NativeDataType::WChar, 1),
        ColumnType::DateTime => (NativeDataType::Date, 0),
        ColumnType::Double => (NativeDataType::Double, 8),
        ColumnType::Decimal => (NativeDataType::Decimal, 16),
        ColumnType::Guid => (NativeDataType::Guid, 16),
        ColumnType::TimeSpan => (NativeDataType::DbTime, 8),
        ColumnType::String if !(1..=JET_MAX_WCHAR_LENGTH).contains(&max_length) => {
            (NativeDataType::LongVarWChar, 0)
        }
        ColumnType::String => (NativeDataType::WChar, max_length as u32),
        ColumnType::Binary => (NativeDataType::LongVarBinary, 0),
        ColumnType::CharBlob => (NativeDataType::LongVarWChar, 0),
    };

    Ok(TypeMapping::lossless(TypeDescriptor::Native(NativeType {
        data_type,
        defined_size,
        nullable,
    })))
}
