//! Error types for the entity model.

/// Errors raised by entity parsing and SQL generation.
#[derive(Debug, thiserror::Error)]
pub enum EntityError {
    /// No parse template matched the raw SQL text.
    #[error("failed to parse SQL into a {kind}: {sql}")]
    ParseFailure {
        /// Entity kind whose templates were tried.
        kind: &'static str,
        /// The offending SQL text.
        sql: String,
    },

    /// The requested operation has no meaningful implementation for this
    /// entity kind (e.g. replace on an extension).
    #[error("{operation} is not supported for {kind} entities")]
    NotSupported {
        /// Entity kind.
        kind: &'static str,
        /// The unsupported operation.
        operation: &'static str,
    },

    /// An entity SQL file could not be read.
    #[error("failed to read entity SQL from {path}")]
    Io {
        /// Path of the file being read.
        path: String,
        /// Underlying filesystem error.
        #[source]
        source: std::io::Error,
    },
}

/// Result type for entity model operations.
pub type Result<T> = std::result::Result<T, EntityError>;
