//! In-memory scan state
//!
//! Only the scanner mutates a [`ScanState`]; everything else reads it.

use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashSet};

use crate::Direction;

/// Interaction counts for one correspondent, keyed elsewhere by lowercased email.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrespondentStat {
    /// Times the operator addressed this correspondent
    #[serde(default)]
    pub sent: u64,
    /// Times this correspondent wrote to the operator
    #[serde(default, rename = "recv")]
    pub received: u64,
    /// Display names seen alongside the address, first-seen order
    #[serde(default)]
    names: Vec<String>,
}

impl CorrespondentStat {
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Record a display name; blanks and repeats are ignored.
    pub fn observe_name(&mut self, name: &str) {
        let name = name.trim();
        if name.is_empty() || self.names.iter().any(|n| n == name) {
            return;
        }
        self.names.push(name.to_string());
    }

    /// The longest observed name; the earliest one wins a tie.
    pub fn best_name(&self) -> Option<&str> {
        crate::resolve::names::longest(self.names.iter().map(String::as_str))
    }

    /// Fold another record for the same address into this one.
    pub(crate) fn merge(&mut self, other: CorrespondentStat) {
        self.sent += other.sent;
        self.received += other.received;
        for name in other.names {
            self.observe_name(&name);
        }
    }

    fn dedupe_names(&mut self) {
        let raw = std::mem::take(&mut self.names);
        for name in raw {
            self.observe_name(&name);
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirectionProgress {
    /// Offset of the next page to fetch
    pub cursor: usize,
    /// Set once the query returned an empty page; sticky until reset
    pub complete: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanProgress {
    pub outgoing: DirectionProgress,
    pub incoming: DirectionProgress,
}

impl ScanProgress {
    pub fn get(&self, direction: Direction) -> &DirectionProgress {
        match direction {
            Direction::Outgoing => &self.outgoing,
            Direction::Incoming => &self.incoming,
        }
    }

    pub fn get_mut(&mut self, direction: Direction) -> &mut DirectionProgress {
        match direction {
            Direction::Outgoing => &mut self.outgoing,
            Direction::Incoming => &mut self.incoming,
        }
    }

    pub fn all_complete(&self) -> bool {
        self.outgoing.complete && self.incoming.complete
    }
}

/// Message-group IDs already counted, per direction. Membership only grows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessedGroupIds {
    outgoing: HashSet<String>,
    incoming: HashSet<String>,
}

impl ProcessedGroupIds {
    fn set(&self, direction: Direction) -> &HashSet<String> {
        match direction {
            Direction::Outgoing => &self.outgoing,
            Direction::Incoming => &self.incoming,
        }
    }

    pub fn contains(&self, direction: Direction, id: &str) -> bool {
        self.set(direction).contains(id)
    }

    /// Returns false when the ID was already present.
    pub fn insert(&mut self, direction: Direction, id: impl Into<String>) -> bool {
        match direction {
            Direction::Outgoing => self.outgoing.insert(id.into()),
            Direction::Incoming => self.incoming.insert(id.into()),
        }
    }

    pub fn len(&self, direction: Direction) -> usize {
        self.set(direction).len()
    }

    /// IDs in sorted order, for stable serialization.
    pub fn sorted(&self, direction: Direction) -> Vec<String> {
        let mut ids: Vec<String> = self.set(direction).iter().cloned().collect();
        ids.sort();
        ids
    }
}

/// Everything a run needs to resume where the last one stopped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanState {
    pub progress: ScanProgress,
    pub processed: ProcessedGroupIds,
    stats: BTreeMap<String, CorrespondentStat>,
}

impl ScanState {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_parts(
        progress: ScanProgress,
        processed: ProcessedGroupIds,
        stats: BTreeMap<String, CorrespondentStat>,
    ) -> Self {
        // Keys differing only in case collapse into one record
        let mut merged: BTreeMap<String, CorrespondentStat> = BTreeMap::new();
        for (email, mut stat) in stats {
            stat.dedupe_names();
            match merged.entry(email.trim().to_lowercase()) {
                Entry::Occupied(mut existing) => existing.get_mut().merge(stat),
                Entry::Vacant(slot) => {
                    slot.insert(stat);
                }
            }
        }
        Self {
            progress,
            processed,
            stats: merged,
        }
    }

    pub fn stats(&self) -> &BTreeMap<String, CorrespondentStat> {
        &self.stats
    }

    pub fn stat(&self, email: &str) -> Option<&CorrespondentStat> {
        self.stats.get(&email.to_lowercase())
    }

    /// Count one observation of `email` in `direction`.
    pub fn record(&mut self, direction: Direction, email: &str, name: &str) {
        let stat = self.stats.entry(email.to_lowercase()).or_default();
        match direction {
            Direction::Outgoing => stat.sent += 1,
            Direction::Incoming => stat.received += 1,
        }
        stat.observe_name(name);
    }
}
