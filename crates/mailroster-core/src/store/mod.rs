//! Checkpoint persistence module
//!
//! Scan progress, processed group IDs and correspondent statistics live in a
//! [`ScanState`] that is loaded from, and saved to, a named blob. Blob stores
//! are also where the exported contact files end up.

pub mod blob;
pub mod checkpoint;
pub mod sqlite;
pub mod state;

// Re-export main types
pub use blob::{BlobStore, DirectoryBlobStore, MemoryBlobStore};
pub use checkpoint::{CheckpointDocument, CheckpointStore, CHECKPOINT_VERSION};
pub use sqlite::{BlobSummary, SqliteBlobStore};
pub use state::{CorrespondentStat, DirectionProgress, ProcessedGroupIds, ScanProgress, ScanState};
