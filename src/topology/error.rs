//! Error types for the topology checker.
//!
//! Topology violations are results, not errors; these types cover the feature
//! store and caller contract failures that stop a run before it starts.

use thiserror::Error;

/// Feature store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite access failed.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A stored geometry could not be parsed.
    #[error("WKT parse error for feature {id}: {message}")]
    Wkt { id: i64, message: String },

    /// Stored attributes are not a JSON object.
    #[error("Attribute parse error for feature {id}: {source}")]
    Attributes {
        id: i64,
        #[source]
        source: serde_json::Error,
    },

    /// Table name is not a plain identifier.
    #[error("Invalid table name: {0}")]
    InvalidTable(String),

    /// The layer has no geometry to infer its kind from.
    #[error("Cannot determine geometry kind of layer {0}")]
    UnknownGeometryKind(String),

    /// IO error while reading a layer file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reasons a rule run produces no result.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("First layer not found")]
    MissingFirstLayer,

    #[error("Second layer not found for rule '{0}'")]
    MissingSecondLayer(&'static str),

    #[error("Unknown topology rule '{0}'")]
    UnknownRule(String),

    #[error("Feature store error: {0}")]
    Store(#[from] StoreError),

    /// Cancellation was observed while building a spatial index.
    #[error("Run cancelled while indexing layer {0}")]
    Cancelled(String),
}
