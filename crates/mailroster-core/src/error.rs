//! Error types shared across the crate

use thiserror::Error;

/// Failures raised by an [`Archive`](crate::scan::Archive).
///
/// These are not retried; the run aborts and the previously saved
/// checkpoint stays as it was.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive query failed: {0}")]
    Query(String),
    #[error("invalid query `{query}`: {reason}")]
    InvalidQuery { query: String, reason: String },
    #[error("archive has no account address")]
    MissingAccount,
    #[error("failed to read archive: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse archive: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum AddressBookError {
    #[error("address book unavailable: {0}")]
    Unavailable(String),
    #[error("failed to parse address book: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("blob store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("blob `{name}` failed its integrity check")]
    Integrity { name: String },
    #[error("failed to encode checkpoint: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("blob `{name}` has an invalid timestamp `{value}`")]
    Timestamp { name: String, value: String },
    #[error("could not determine home directory")]
    NoHomeDirectory,
}

/// Reasons a stored checkpoint is discarded.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("unsupported checkpoint version {0}")]
    Version(u32),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid exclusion pattern `{pattern}`: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("page size must be greater than zero")]
    ZeroPageSize,
    #[error("traversal cap must be greater than zero")]
    ZeroTraversalCap,
    #[error("country code `{0}` contains no digits")]
    CountryCode(String),
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Umbrella error for a full run.
#[derive(Debug, Error)]
pub enum RosterError {
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
