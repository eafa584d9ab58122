//! Budget-aware, resumable scanning of one archive query

use crate::budget::Budget;
use crate::error::ArchiveError;
use crate::scan::address::{extract_addresses, ExclusionFilter};
use crate::scan::archive::{Archive, Message, MessageGroup};
use crate::store::ScanState;
use crate::Direction;

/// Result of scanning one query for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStatus {
    /// True once the query returned an empty page
    pub exhausted: bool,
    /// Pages fetched during this call
    pub pages: usize,
    /// Groups newly processed during this call
    pub groups_processed: usize,
}

/// Emitted after every page.
#[derive(Debug, Clone)]
pub struct ScanEvent {
    pub direction: Direction,
    pub cursor: usize,
    pub page_len: usize,
    pub groups_processed: usize,
}

/// Walks archive pages and folds their addresses into a [`ScanState`].
pub struct Scanner<'a> {
    archive: &'a dyn Archive,
    filter: &'a ExclusionFilter,
    account: String,
    page_size: usize,
    traversal_cap: usize,
    progress_callback: Option<&'a dyn Fn(&ScanEvent)>,
}

impl<'a> Scanner<'a> {
    pub fn new(
        archive: &'a dyn Archive,
        filter: &'a ExclusionFilter,
        page_size: usize,
        traversal_cap: usize,
    ) -> Result<Self, ArchiveError> {
        let account = archive.account()?.trim().to_lowercase();
        if account.is_empty() {
            return Err(ArchiveError::MissingAccount);
        }

        Ok(Self {
            archive,
            filter,
            account,
            page_size: page_size.max(1),
            traversal_cap,
            progress_callback: None,
        })
    }

    pub fn set_progress_callback(&mut self, callback: &'a dyn Fn(&ScanEvent)) {
        self.progress_callback = Some(callback);
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    /// Scan `query` in `direction` from the saved cursor until the budget or
    /// the traversal cap runs out, or the query is exhausted.
    ///
    /// A direction already marked complete is left untouched.
    pub fn scan(
        &self,
        query: &str,
        direction: Direction,
        state: &mut ScanState,
        budget: &dyn Budget,
    ) -> Result<ScanStatus, ArchiveError> {
        let mut status = ScanStatus::default();

        if state.progress.get(direction).complete {
            tracing::debug!("{} scan already complete, skipping", direction);
            status.exhausted = true;
            return Ok(status);
        }

        let mut start = state.progress.get(direction).cursor;
        let mut traversed = 0usize;

        while traversed < self.traversal_cap && !budget.exhausted() {
            let groups = self.archive.search(query, start, self.page_size)?;
            status.pages += 1;

            if groups.is_empty() {
                let progress = state.progress.get_mut(direction);
                progress.cursor = 0;
                progress.complete = true;
                status.exhausted = true;
                tracing::info!("Finished {} scan: no more groups.", direction);
                return Ok(status);
            }

            let mut consumed = 0usize;
            let mut out_of_time = false;
            for group in &groups {
                consumed += 1;
                if !state.processed.contains(direction, &group.id) {
                    self.process_group(group, direction, state);
                    state.processed.insert(direction, group.id.clone());
                    status.groups_processed += 1;
                }

                // Already-processed groups count against the budget too
                if budget.exhausted() {
                    out_of_time = true;
                    break;
                }
            }

            // A page cut short only moves the cursor past what was consumed
            let advance = if out_of_time && consumed < groups.len() {
                consumed
            } else {
                self.page_size
            };
            traversed += advance;
            start += advance;
            state.progress.get_mut(direction).cursor = start;

            tracing::debug!(
                "{} page of {} at offset {}, cursor now {}",
                direction,
                groups.len(),
                start - advance,
                start
            );
            if let Some(callback) = self.progress_callback {
                callback(&ScanEvent {
                    direction,
                    cursor: start,
                    page_len: groups.len(),
                    groups_processed: status.groups_processed,
                });
            }

            if budget.exhausted() {
                tracing::info!(
                    "Stopping {} scan early to respect the time budget. New groups processed this run: {}",
                    direction,
                    status.groups_processed
                );
                return Ok(status);
            }
        }

        tracing::info!(
            "{}: traversed {} groups this run, newly processed: {}",
            direction,
            traversed,
            status.groups_processed
        );
        Ok(status)
    }

    fn process_group(&self, group: &MessageGroup, direction: Direction, state: &mut ScanState) {
        for message in group.messages.iter().filter(|m| !m.draft) {
            match direction {
                Direction::Outgoing => {
                    if !self.sent_by_me(message) {
                        continue;
                    }
                    for header in message.recipient_headers() {
                        self.count(header, direction, state);
                    }
                }
                Direction::Incoming => {
                    if !self.addressed_to_me(message) {
                        continue;
                    }
                    self.count(&message.from, direction, state);
                }
            }
        }
    }

    fn count(&self, header: &str, direction: Direction, state: &mut ScanState) {
        for address in extract_addresses(header) {
            let email = address.email.to_lowercase();
            if self.filter.is_excluded(&email) {
                continue;
            }
            state.record(direction, &email, &address.name);
        }
    }

    fn sent_by_me(&self, message: &Message) -> bool {
        message.from.to_lowercase().contains(&self.account)
    }

    fn addressed_to_me(&self, message: &Message) -> bool {
        message
            .recipient_headers()
            .join(",")
            .to_lowercase()
            .contains(&self.account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::Unlimited;
    use crate::scan::archive::MemoryArchive;
    use std::cell::Cell;

    const ME: &str = "me@x.com";

    /// Runs out after a fixed number of checks.
    struct CheckBudget {
        remaining: Cell<usize>,
    }

    impl CheckBudget {
        fn new(checks: usize) -> Self {
            Self {
                remaining: Cell::new(checks),
            }
        }
    }

    impl Budget for CheckBudget {
        fn exhausted(&self) -> bool {
            let left = self.remaining.get();
            if left == 0 {
                return true;
            }
            self.remaining.set(left - 1);
            false
        }
    }

    fn sent_group(id: &str, to: &str) -> MessageGroup {
        MessageGroup {
            id: id.to_string(),
            labels: vec!["sent".to_string()],
            messages: vec![Message {
                from: format!("Me <{}>", ME),
                to: to.to_string(),
                ..Default::default()
            }],
        }
    }

    fn inbox_group(id: &str, from: &str) -> MessageGroup {
        MessageGroup {
            id: id.to_string(),
            labels: vec!["inbox".to_string()],
            messages: vec![Message {
                from: from.to_string(),
                to: ME.to_string(),
                ..Default::default()
            }],
        }
    }

    #[test]
    fn test_outgoing_counts_recipients() {
        let archive = MemoryArchive::new(
            ME,
            vec![MessageGroup {
                id: "t1".to_string(),
                labels: vec!["sent".to_string()],
                messages: vec![Message {
                    from: ME.to_string(),
                    to: r#""Alice Smith" <Alice@X.com>"#.to_string(),
                    cc: "bob@y.org".to_string(),
                    bcc: "noreply@x.com".to_string(),
                    draft: false,
                }],
            }],
        );
        let filter = ExclusionFilter::default();
        let scanner = Scanner::new(&archive, &filter, 10, 100).unwrap();
        let mut state = ScanState::new();

        let status = scanner
            .scan("in:sent", Direction::Outgoing, &mut state, &Unlimited)
            .unwrap();

        assert!(status.exhausted);
        assert_eq!(status.groups_processed, 1);
        assert_eq!(state.stat("alice@x.com").unwrap().sent, 1);
        assert_eq!(state.stat("alice@x.com").unwrap().names(), ["Alice Smith"]);
        assert_eq!(state.stat("bob@y.org").unwrap().sent, 1);
        assert!(state.stat("noreply@x.com").is_none());
        assert!(state.progress.outgoing.complete);
        assert_eq!(state.progress.outgoing.cursor, 0);
    }

    #[test]
    fn test_messages_not_from_me_and_drafts_are_skipped() {
        let mut draft = sent_group("t2", "draft@x.com");
        draft.messages[0].draft = true;
        let archive = MemoryArchive::new(
            ME,
            vec![sent_group("t1", "a@x.com"), draft, {
                let mut g = sent_group("t3", "c@x.com");
                g.messages[0].from = "other@y.org".to_string();
                g
            }],
        );
        let filter = ExclusionFilter::default();
        let scanner = Scanner::new(&archive, &filter, 10, 100).unwrap();
        let mut state = ScanState::new();

        scanner
            .scan("in:sent", Direction::Outgoing, &mut state, &Unlimited)
            .unwrap();

        assert_eq!(state.stats().len(), 1);
        assert!(state.stat("a@x.com").is_some());
        assert_eq!(state.processed.len(Direction::Outgoing), 3);
    }

    #[test]
    fn test_incoming_counts_sender_when_addressed_to_me() {
        let mut not_mine = inbox_group("t2", "carol@z.net");
        not_mine.messages[0].to = "list@z.net".to_string();
        let archive = MemoryArchive::new(
            ME,
            vec![inbox_group("t1", "Bob <bob@y.org>"), not_mine],
        );
        let filter = ExclusionFilter::default();
        let scanner = Scanner::new(&archive, &filter, 10, 100).unwrap();
        let mut state = ScanState::new();

        scanner
            .scan("in:inbox", Direction::Incoming, &mut state, &Unlimited)
            .unwrap();

        let bob = state.stat("bob@y.org").unwrap();
        assert_eq!((bob.sent, bob.received), (0, 1));
        assert!(state.stat("carol@z.net").is_none());
    }

    #[test]
    fn test_completed_direction_is_a_no_op() {
        let archive = MemoryArchive::new(ME, vec![sent_group("t1", "a@x.com")]);
        let filter = ExclusionFilter::default();
        let scanner = Scanner::new(&archive, &filter, 10, 100).unwrap();
        let mut state = ScanState::new();

        scanner
            .scan("in:sent", Direction::Outgoing, &mut state, &Unlimited)
            .unwrap();
        let snapshot = state.clone();
        let searches = archive.search_count();

        let status = scanner
            .scan("in:sent", Direction::Outgoing, &mut state, &Unlimited)
            .unwrap();

        assert!(status.exhausted);
        assert_eq!(state, snapshot);
        assert_eq!(archive.search_count(), searches);
    }

    #[test]
    fn test_cursor_advances_by_page_size() {
        let groups = (0..5)
            .map(|i| sent_group(&format!("t{}", i), "a@x.com"))
            .collect();
        let archive = MemoryArchive::new(ME, groups);
        let filter = ExclusionFilter::default();
        let scanner = Scanner::new(&archive, &filter, 2, 4).unwrap();
        let mut state = ScanState::new();

        let status = scanner
            .scan("in:sent", Direction::Outgoing, &mut state, &Unlimited)
            .unwrap();

        // Traversal cap of 4 stops after two pages of two
        assert!(!status.exhausted);
        assert_eq!(status.pages, 2);
        assert_eq!(state.progress.outgoing.cursor, 4);
        assert_eq!(state.stat("a@x.com").unwrap().sent, 4);
    }

    #[test]
    fn test_budget_stop_mid_page_keeps_unconsumed_groups() {
        let groups = (0..4)
            .map(|i| sent_group(&format!("t{}", i), &format!("p{}@x.com", i)))
            .collect();
        let archive = MemoryArchive::new(ME, groups);
        let filter = ExclusionFilter::default();
        let scanner = Scanner::new(&archive, &filter, 4, 100).unwrap();
        let mut state = ScanState::new();

        // Loop check, then the first group's check; the second group check fails
        let status = scanner
            .scan("in:sent", Direction::Outgoing, &mut state, &CheckBudget::new(2))
            .unwrap();

        assert!(!status.exhausted);
        assert_eq!(status.groups_processed, 2);
        assert_eq!(state.progress.outgoing.cursor, 2);

        let status = scanner
            .scan("in:sent", Direction::Outgoing, &mut state, &Unlimited)
            .unwrap();
        assert!(status.exhausted);
        assert_eq!(state.stats().len(), 4);
    }

    #[test]
    fn test_processed_groups_still_consume_budget() {
        let groups = (0..4)
            .map(|i| sent_group(&format!("t{}", i), &format!("p{}@x.com", i)))
            .collect();
        let archive = MemoryArchive::new(ME, groups);
        let filter = ExclusionFilter::default();
        let scanner = Scanner::new(&archive, &filter, 4, 100).unwrap();
        let mut state = ScanState::new();
        for id in ["t0", "t1", "t2"] {
            state.processed.insert(Direction::Outgoing, id);
        }

        // Loop check, then t0's check; the check after t1 fails
        let status = scanner
            .scan("in:sent", Direction::Outgoing, &mut state, &CheckBudget::new(2))
            .unwrap();

        assert!(!status.exhausted);
        assert_eq!(status.groups_processed, 0);
        assert_eq!(state.progress.outgoing.cursor, 2);
        assert!(state.stat("p3@x.com").is_none());
    }

    #[test]
    fn test_archive_failure_propagates() {
        let archive = MemoryArchive::new(ME, vec![sent_group("t1", "a@x.com")]).failing_after(0);
        let filter = ExclusionFilter::default();
        let scanner = Scanner::new(&archive, &filter, 10, 100).unwrap();
        let mut state = ScanState::new();

        let result = scanner.scan("in:sent", Direction::Outgoing, &mut state, &Unlimited);
        assert!(matches!(result, Err(ArchiveError::Query(_))));
        assert_eq!(state, ScanState::new());
    }

    #[test]
    fn test_empty_account_is_rejected() {
        let archive = MemoryArchive::new("  ", vec![]);
        let filter = ExclusionFilter::default();
        assert!(matches!(
            Scanner::new(&archive, &filter, 10, 100),
            Err(ArchiveError::MissingAccount)
        ));
    }

    #[test]
    fn test_progress_callback_sees_every_page() {
        let groups = (0..3)
            .map(|i| sent_group(&format!("t{}", i), "a@x.com"))
            .collect();
        let archive = MemoryArchive::new(ME, groups);
        let filter = ExclusionFilter::default();
        let pages = Cell::new(0usize);
        let callback = |event: &ScanEvent| {
            assert_eq!(event.direction, Direction::Outgoing);
            pages.set(pages.get() + 1);
        };
        let mut scanner = Scanner::new(&archive, &filter, 2, 100).unwrap();
        scanner.set_progress_callback(&callback);

        let mut state = ScanState::new();
        scanner
            .scan("in:sent", Direction::Outgoing, &mut state, &Unlimited)
            .unwrap();

        assert_eq!(pages.get(), 2);
    }
}
