//! Resumable mailbox scanning and contact consolidation.
//!
//! A run loads the checkpoint, scans the outgoing and incoming queries of an
//! [`Archive`] under a time [`Budget`], saves the checkpoint, and once both
//! scans are exhausted resolves the accumulated correspondent statistics
//! (plus an optional [`AddressBook`]) into deduplicated contacts written as
//! vCard and CSV.
//!
//! The checkpoint store has a single logical writer. Running two invocations
//! against the same store at the same time is not supported.

use serde::{Deserialize, Serialize};

pub mod budget;
pub mod config;
pub mod error;
pub mod export;
pub mod pipeline;
pub mod resolve;
pub mod scan;
pub mod store;

pub use budget::{Budget, Deadline, Unlimited};
pub use config::{InclusionRule, RunConfig};
pub use error::{AddressBookError, ArchiveError, ConfigError, RosterError, StoreError};
pub use export::{render, RenderedContacts};
pub use pipeline::{ExportSummary, Pipeline, RunOutcome, StatusReport};
pub use resolve::{
    normalize_phone, AddressBook, AddressBookRecord, ContactRecord, JsonAddressBook,
    PhoneNormalizer, Resolver,
};
pub use scan::{
    extract_addresses, Archive, ExclusionFilter, JsonArchive, MemoryArchive, Message,
    MessageGroup, ScanEvent, ScanStatus, Scanner,
};
pub use store::{
    BlobStore, CheckpointStore, CorrespondentStat, DirectoryBlobStore, MemoryBlobStore,
    ScanState, SqliteBlobStore,
};

/// Which side of the conversation the operator is on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// The operator sent the message; recipients are counted.
    Outgoing,
    /// The operator received the message; the sender is counted.
    Incoming,
}

impl Direction {
    pub const ALL: [Direction; 2] = [Direction::Outgoing, Direction::Incoming];
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Outgoing => write!(f, "outgoing"),
            Direction::Incoming => write!(f, "incoming"),
        }
    }
}
