//! Checkpoint document and its load/save/reset lifecycle

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::blob::BlobStore;
use super::state::{
    CorrespondentStat, DirectionProgress, ProcessedGroupIds, ScanProgress, ScanState,
};
use crate::error::{CheckpointError, StoreError};
use crate::Direction;

pub const CHECKPOINT_VERSION: u32 = 1;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cursors {
    #[serde(default)]
    pub sent_start: usize,
    #[serde(default)]
    pub recv_start: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionFlags {
    #[serde(default)]
    pub sent_done: bool,
    #[serde(default)]
    pub recv_done: bool,
}

/// On-disk shape of the checkpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointDocument {
    pub version: u32,
    #[serde(default)]
    pub progress: Cursors,
    #[serde(default)]
    pub flags: CompletionFlags,
    #[serde(default)]
    pub processed_sent_thread_ids: Vec<String>,
    #[serde(default)]
    pub processed_recv_thread_ids: Vec<String>,
    #[serde(default)]
    pub email_stats: BTreeMap<String, CorrespondentStat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_id: Option<Uuid>,
}

impl CheckpointDocument {
    pub fn from_state(state: &ScanState, run_id: Option<Uuid>) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            progress: Cursors {
                sent_start: state.progress.outgoing.cursor,
                recv_start: state.progress.incoming.cursor,
            },
            flags: CompletionFlags {
                sent_done: state.progress.outgoing.complete,
                recv_done: state.progress.incoming.complete,
            },
            processed_sent_thread_ids: state.processed.sorted(Direction::Outgoing),
            processed_recv_thread_ids: state.processed.sorted(Direction::Incoming),
            email_stats: state.stats().clone(),
            updated_at: Some(Utc::now()),
            last_run_id: run_id,
        }
    }

    pub fn into_state(self) -> Result<ScanState, CheckpointError> {
        if self.version != CHECKPOINT_VERSION {
            return Err(CheckpointError::Version(self.version));
        }

        let progress = ScanProgress {
            outgoing: DirectionProgress {
                cursor: self.progress.sent_start,
                complete: self.flags.sent_done,
            },
            incoming: DirectionProgress {
                cursor: self.progress.recv_start,
                complete: self.flags.recv_done,
            },
        };

        let mut processed = ProcessedGroupIds::default();
        for id in self.processed_sent_thread_ids {
            processed.insert(Direction::Outgoing, id);
        }
        for id in self.processed_recv_thread_ids {
            processed.insert(Direction::Incoming, id);
        }

        Ok(ScanState::from_parts(progress, processed, self.email_stats))
    }

    pub fn decode(text: &str) -> Result<ScanState, CheckpointError> {
        let document: CheckpointDocument = serde_json::from_str(text)?;
        document.into_state()
    }
}

/// Loads and saves the [`ScanState`] under one blob name.
pub struct CheckpointStore<'a> {
    blobs: &'a dyn BlobStore,
    name: String,
}

impl<'a> CheckpointStore<'a> {
    pub fn new(blobs: &'a dyn BlobStore, name: impl Into<String>) -> Self {
        Self {
            blobs,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Load the saved state, or an empty one.
    ///
    /// A checkpoint that cannot be decoded is logged and replaced by an
    /// empty state; only store failures are returned as errors.
    pub fn load(&self) -> Result<ScanState, StoreError> {
        let text = match self.blobs.read(&self.name) {
            Ok(Some(text)) => text,
            Ok(None) => {
                tracing::info!("No checkpoint `{}` found, starting fresh", self.name);
                return Ok(ScanState::new());
            }
            Err(StoreError::Integrity { name }) => {
                tracing::warn!("Checkpoint `{}` is corrupt, starting fresh", name);
                return Ok(ScanState::new());
            }
            Err(e) => return Err(e),
        };

        match CheckpointDocument::decode(&text) {
            Ok(state) => {
                tracing::info!(
                    "Loaded checkpoint `{}`: {} correspondents, outgoing at {}, incoming at {}",
                    self.name,
                    state.stats().len(),
                    state.progress.outgoing.cursor,
                    state.progress.incoming.cursor
                );
                Ok(state)
            }
            Err(e) => {
                tracing::warn!("Checkpoint parse error, starting fresh: {}", e);
                Ok(ScanState::new())
            }
        }
    }

    pub fn save(&self, state: &ScanState, run_id: Option<Uuid>) -> Result<(), StoreError> {
        let document = CheckpointDocument::from_state(state, run_id);
        let text = serde_json::to_string(&document)?;
        self.blobs.write(&self.name, &text)?;

        tracing::info!("Saved checkpoint `{}` ({} bytes)", self.name, text.len());
        Ok(())
    }

    /// Delete the checkpoint so the next run starts from nothing.
    pub fn reset(&self) -> Result<bool, StoreError> {
        let deleted = self.blobs.delete(&self.name)?;
        if deleted {
            tracing::info!("Checkpoint `{}` deleted. Next run starts fresh.", self.name);
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryBlobStore, SqliteBlobStore};

    fn populated_state() -> ScanState {
        let mut state = ScanState::new();
        state.record(Direction::Outgoing, "alice@x.com", "Alice Smith");
        state.record(Direction::Outgoing, "alice@x.com", "");
        state.record(Direction::Incoming, "bob@y.org", "Bob");
        state.processed.insert(Direction::Outgoing, "t-1");
        state.processed.insert(Direction::Incoming, "t-9");
        state.progress.outgoing.cursor = 400;
        state.progress.incoming.complete = true;
        state
    }

    #[test]
    fn test_save_and_load_checkpoint() {
        let blobs = MemoryBlobStore::new();
        let store = CheckpointStore::new(&blobs, "cp.json");

        let state = populated_state();
        store.save(&state, Some(Uuid::new_v4())).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded, state);
    }

    #[test]
    fn test_document_field_names() {
        let document = CheckpointDocument::from_state(&populated_state(), None);
        let value = serde_json::to_value(&document).unwrap();

        assert_eq!(value["version"], 1);
        assert_eq!(value["progress"]["sentStart"], 400);
        assert_eq!(value["flags"]["recvDone"], true);
        assert_eq!(value["processedSentThreadIds"][0], "t-1");
        assert_eq!(value["emailStats"]["alice@x.com"]["sent"], 2);
        assert_eq!(value["emailStats"]["bob@y.org"]["recv"], 1);
        assert_eq!(value["emailStats"]["bob@y.org"]["names"][0], "Bob");
        assert!(value.get("lastRunId").is_none());
    }

    #[test]
    fn test_sparse_document_is_accepted() {
        let state = CheckpointDocument::decode(
            r#"{"version":1,"emailStats":{"Carol@Z.com":{"sent":3,"names":["C","C"]}}}"#,
        )
        .unwrap();

        let stat = state.stat("carol@z.com").unwrap();
        assert_eq!(stat.sent, 3);
        assert_eq!(stat.received, 0);
        assert_eq!(stat.names(), ["C"]);
        assert_eq!(state.progress, ScanProgress::default());
    }

    #[test]
    fn test_case_variant_keys_are_summed() {
        let state = CheckpointDocument::decode(
            r#"{"version":1,"emailStats":{
                "Carol@x.com":{"sent":3,"names":["Carol"]},
                "carol@x.com":{"sent":2,"recv":1,"names":["Carol Ng","Carol"]}}}"#,
        )
        .unwrap();

        assert_eq!(state.stats().len(), 1);
        let stat = state.stat("carol@x.com").unwrap();
        assert_eq!((stat.sent, stat.received), (5, 1));
        assert_eq!(stat.names(), ["Carol", "Carol Ng"]);
    }

    #[test]
    fn test_corrupt_checkpoint_starts_fresh() {
        let blobs = MemoryBlobStore::new();
        blobs.write("cp.json", "{not json").unwrap();

        let store = CheckpointStore::new(&blobs, "cp.json");
        assert_eq!(store.load().unwrap(), ScanState::new());
    }

    #[test]
    fn test_unknown_version_starts_fresh() {
        let blobs = MemoryBlobStore::new();
        blobs.write("cp.json", r#"{"version":7}"#).unwrap();

        let store = CheckpointStore::new(&blobs, "cp.json");
        assert_eq!(store.load().unwrap(), ScanState::new());
        assert!(matches!(
            CheckpointDocument::decode(r#"{"version":7}"#),
            Err(CheckpointError::Version(7))
        ));
    }

    #[test]
    fn test_reset_deletes_checkpoint() {
        let blobs = SqliteBlobStore::open_in_memory().unwrap();
        let store = CheckpointStore::new(&blobs, "cp.json");

        store.save(&populated_state(), None).unwrap();
        assert!(store.reset().unwrap());
        assert!(!store.reset().unwrap());
        assert_eq!(store.load().unwrap(), ScanState::new());
    }
}
