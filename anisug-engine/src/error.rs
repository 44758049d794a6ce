//! Error types for the suggestion engine
//!
//! Sparse-data gaps (an item without genres, a genre nobody rated) are not
//! errors: they resolve to the neutral score. The variants below cover
//! contract violations, rejected queries and I/O failures.

use thiserror::Error;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Engine error type
#[derive(Debug, Error)]
pub enum EngineError {
    /// Requested the weight of an edge that does not exist
    #[error("No edge between '{a}' and '{b}'")]
    MissingEdge { a: String, b: String },

    /// A key already exists as a node of the other kind
    #[error("Node '{key}' already exists as {existing}, cannot re-add as {requested}")]
    KindConflict {
        key: String,
        existing: &'static str,
        requested: &'static str,
    },

    /// A dataset user uses the reserved query-user key
    #[error("User key '{0}' is reserved for the session query user")]
    ReservedKey(String),

    /// The query user was already added to this graph
    #[error("Query user is already present in the graph")]
    QueryUserPresent,

    /// The partition does not assign the query user to any cluster
    #[error("Query user is not assigned to a cluster")]
    QueryUserUnpartitioned,

    /// The partition was produced for an earlier state of the graph
    #[error("Partition is stale: produced at graph revision {partition_revision}, graph is at {graph_revision}")]
    StalePartition {
        partition_revision: u64,
        graph_revision: u64,
    },

    /// The partition leaves some graph nodes unassigned
    #[error("Partition is not total: {missing} node(s) unassigned (e.g. '{example}')")]
    IncompletePartition { missing: usize, example: String },

    /// Rejected session input
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Snapshot file written by an unknown format or a newer version
    #[error("Unsupported snapshot: {0}")]
    UnsupportedSnapshot(String),

    /// Malformed dataset row
    #[error("Dataset error in {file} line {line}: {message}")]
    Dataset {
        file: String,
        line: u64,
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV reader error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML preference file error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// anisug-common error
    #[error("Common error: {0}")]
    Common(#[from] anisug_common::Error),
}
