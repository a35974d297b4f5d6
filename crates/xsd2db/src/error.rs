//! Error types for the schema compiler and database adapters.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for xsd2db operations.
#[derive(Error, Debug)]
pub enum Xsd2DbError {
    /// Malformed or missing input for a named entity (schema, table, relation).
    #[error("Invalid argument for {entity}: {message}")]
    Argument { entity: String, message: String },

    /// A column's abstract type has no mapping for the target engine.
    #[error("No type mapping is provided for {type_name} on {engine} (column {table}.{column})")]
    UnsupportedType {
        table: String,
        column: String,
        type_name: String,
        engine: String,
    },

    /// The database engine rejected an operation. The engine-native code is kept verbatim.
    #[error("{}", engine_message(.code, .message))]
    Engine { code: Option<i32>, message: String },

    /// A connection or catalog handle could not be acquired or released.
    #[error("Resource error: {message}\n  Context: {context}")]
    Resource { message: String, context: String },

    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Schema source file does not exist.
    #[error("File not found: {}", .0.display())]
    SchemaNotFound(PathBuf),

    /// Schema source file could not be understood.
    #[error("Schema format error: {0}")]
    SchemaFormat(String),

    /// Some entities were skipped while the rest of the schema was created.
    #[error("{} schema entities were skipped", .failures.len())]
    Incomplete { failures: Vec<Xsd2DbError> },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn engine_message(code: &Option<i32>, message: &str) -> String {
    match code {
        Some(code) => format!("Database engine error {}: {}", code, message),
        None => format!("Database engine error: {}", message),
    }
}

impl From<tiberius::error::Error> for Xsd2DbError {
    fn from(err: tiberius::error::Error) -> Self {
        match &err {
            tiberius::error::Error::Server(token) => Xsd2DbError::Engine {
                code: Some(token.code() as i32),
                message: token.message().to_string(),
            },
            _ => Xsd2DbError::Engine {
                code: None,
                message: err.to_string(),
            },
        }
    }
}

impl Xsd2DbError {
    /// Create an Argument error naming the offending entity
    pub fn argument(entity: impl Into<String>, message: impl Into<String>) -> Self {
        Xsd2DbError::Argument {
            entity: entity.into(),
            message: message.into(),
        }
    }

    /// Attribute an identifier-level Argument error to the table or
    /// relation it was found in. Other errors are returned unchanged.
    pub fn for_entity(self, entity: &str) -> Self {
        match self {
            Xsd2DbError::Argument {
                entity: identifier,
                message,
            } if identifier != entity => Xsd2DbError::Argument {
                entity: entity.to_string(),
                message: format!("{} (identifier {})", message, identifier),
            },
            other => other,
        }
    }

    /// Create a Resource error with context about where it occurred
    pub fn resource(message: impl Into<String>, context: impl Into<String>) -> Self {
        Xsd2DbError::Resource {
            message: message.into(),
            context: context.into(),
        }
    }

    /// Create an Engine error carrying a native diagnostic code
    pub fn engine(code: i32, message: impl Into<String>) -> Self {
        Xsd2DbError::Engine {
            code: Some(code),
            message: message.into(),
        }
    }

    /// Engine-native diagnostic code, if this error came from the engine.
    pub fn engine_code(&self) -> Option<i32> {
        match self {
            Xsd2DbError::Engine { code, .. } => *code,
            _ => None,
        }
    }

    /// True for errors caused by bad input rather than by the environment.
    pub fn is_argument(&self) -> bool {
        matches!(
            self,
            Xsd2DbError::Argument { .. } | Xsd2DbError::Config(_) | Xsd2DbError::SchemaFormat(_)
        )
    }

    /// Process exit status for this error category.
    pub fn exit_code(&self) -> u8 {
        match self {
            Xsd2DbError::Argument { .. }
            | Xsd2DbError::Config(_)
            | Xsd2DbError::SchemaFormat(_)
            | Xsd2DbError::Yaml(_)
            | Xsd2DbError::Json(_) => 1,
            Xsd2DbError::UnsupportedType { .. } => 3,
            Xsd2DbError::Engine { .. } => 4,
            Xsd2DbError::Resource { .. } => 5,
            Xsd2DbError::SchemaNotFound(_) => 6,
            Xsd2DbError::Io(_) => 7,
            Xsd2DbError::Incomplete { failures } => {
                failures.iter().map(Xsd2DbError::exit_code).max().unwrap_or(1)
            }
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        if let Xsd2DbError::Incomplete { failures } = self {
            for failure in failures {
                output.push_str(&format!("  - {}\n", failure));
            }
        }

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for xsd2db operations.
pub type Result<T> = std::result::Result<T, Xsd2DbError>;
