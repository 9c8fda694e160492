use thiserror::Error;

/// Errors raised while building, updating, or querying an index database.
#[derive(Debug, Error)]
pub enum Error {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("database missing schema_version")]
    MissingSchemaVersion,

    #[error("schema version mismatch: expected {expected}, got {found}")]
    SchemaMismatch { expected: String, found: String },

    #[error("database missing required table '{0}'")]
    MissingTable(&'static str),

    #[error("virtual path not found in any indexed PBO: {0}")]
    NotFound(String),

    /// An archive entry's body failed to extract or parse. Collected by
    /// the build/update loop as a skipped-metadata case, never fatal to
    /// the surrounding archive.
    #[error("failed to index entry '{0}'")]
    EntryIndexFailed(String),
}

pub type Result<T> = std::result::Result<T, Error>;
