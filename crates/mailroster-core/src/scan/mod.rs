//! Incremental archive scanning
//!
//! [`Scanner`] walks one query of an [`Archive`] page by page, counting the
//! correspondents it finds with [`extract_addresses`] and skipping automated
//! senders via [`ExclusionFilter`].

pub mod address;
pub mod archive;
pub mod scanner;

pub use address::{extract_addresses, Address, ExclusionFilter, DEFAULT_EXCLUSION_PATTERNS};
pub use archive::{Archive, JsonArchive, MemoryArchive, Message, MessageGroup, Query};
pub use scanner::{ScanEvent, ScanStatus, Scanner};
