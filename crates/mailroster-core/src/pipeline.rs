//! One invocation from checkpoint load to exported contacts

use serde::Serialize;
use uuid::Uuid;

use crate::budget::Budget;
use crate::config::RunConfig;
use crate::error::RosterError;
use crate::export::render;
use crate::resolve::{AddressBook, AddressBookRecord, Resolver};
use crate::scan::{Archive, ExclusionFilter, ScanEvent, Scanner};
use crate::store::{BlobStore, CheckpointStore, ScanState};
use crate::Direction;

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The budget ran out; progress is saved and the next run resumes.
    OutOfTime,
    /// The budget held but at least one query is not exhausted yet.
    Incomplete,
    /// Both queries are exhausted and the outputs were written.
    Complete { contacts: usize },
}

/// What an export wrote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    pub candidates: usize,
    pub contacts: usize,
    pub vcard_name: String,
    pub csv_name: String,
}

/// Snapshot of the saved checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub outgoing_cursor: usize,
    pub incoming_cursor: usize,
    pub outgoing_complete: bool,
    pub incoming_complete: bool,
    pub processed_outgoing: usize,
    pub processed_incoming: usize,
    pub correspondents: usize,
    /// Correspondents that currently pass the inclusion rule
    pub qualifying: usize,
}

/// Ties the scanner, checkpoint, resolver and exporter together.
///
/// Checkpoints live in `state_store`; vCard and CSV outputs go to
/// `output_store`. Only one pipeline may write a given checkpoint at a time.
pub struct Pipeline<'a> {
    config: RunConfig,
    state_store: &'a dyn BlobStore,
    output_store: &'a dyn BlobStore,
    address_book: Option<&'a dyn AddressBook>,
    progress_callback: Option<Box<dyn Fn(&ScanEvent) + 'a>>,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: RunConfig,
        state_store: &'a dyn BlobStore,
        output_store: &'a dyn BlobStore,
    ) -> Self {
        Self {
            config,
            state_store,
            output_store,
            address_book: None,
            progress_callback: None,
        }
    }

    pub fn with_address_book(mut self, address_book: &'a dyn AddressBook) -> Self {
        self.address_book = Some(address_book);
        self
    }

    /// Set a callback invoked after every archive page.
    pub fn set_progress_callback<F>(&mut self, callback: F)
    where
        F: Fn(&ScanEvent) + 'a,
    {
        self.progress_callback = Some(Box::new(callback));
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    fn checkpoints(&self) -> CheckpointStore<'_> {
        CheckpointStore::new(self.state_store, self.config.checkpoint_name.clone())
    }

    /// Scan both directions under `budget`, save the checkpoint, and export
    /// once both are exhausted.
    ///
    /// An archive failure aborts the run before anything is saved.
    pub fn run(&self, archive: &dyn Archive, budget: &dyn Budget) -> Result<RunOutcome, RosterError> {
        self.config.validate()?;
        let filter = self.config.exclusion_filter()?;

        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("run", %run_id);
        let _guard = span.enter();

        let mut scanner = Scanner::new(
            archive,
            &filter,
            self.config.page_size,
            self.config.traversal_cap,
        )?;
        if let Some(callback) = self.progress_callback.as_deref() {
            scanner.set_progress_callback(callback);
        }
        tracing::info!("Scanning mailbox of {}", scanner.account());

        let checkpoints = self.checkpoints();
        let mut state = checkpoints.load()?;

        for direction in Direction::ALL {
            scanner.scan(self.config.query(direction), direction, &mut state, budget)?;

            if budget.exhausted() {
                checkpoints.save(&state, Some(run_id))?;
                tracing::info!(
                    "Stopped early during {} scan due to time budget. Progress saved; run again to continue.",
                    direction
                );
                return Ok(RunOutcome::OutOfTime);
            }
        }

        checkpoints.save(&state, Some(run_id))?;

        if !state.progress.all_complete() {
            tracing::info!(
                "Scan incomplete (outgoing done: {}, incoming done: {}). Run again to continue.",
                state.progress.outgoing.complete,
                state.progress.incoming.complete
            );
            return Ok(RunOutcome::Incomplete);
        }

        let summary = self.export_state(&state, &filter)?;
        tracing::info!(
            "Scan complete. Wrote {} contacts to {} and {}",
            summary.contacts,
            summary.vcard_name,
            summary.csv_name
        );
        Ok(RunOutcome::Complete {
            contacts: summary.contacts,
        })
    }

    /// Export from whatever statistics the checkpoint holds, finished or not.
    pub fn export(&self) -> Result<ExportSummary, RosterError> {
        self.config.validate()?;
        let filter = self.config.exclusion_filter()?;
        let state = self.checkpoints().load()?;

        if !state.progress.all_complete() {
            tracing::warn!("Exporting before both scans are complete; contacts may be missing");
        }
        self.export_state(&state, &filter)
    }

    pub fn status(&self) -> Result<StatusReport, RosterError> {
        let state = self.checkpoints().load()?;
        let qualifying = state
            .stats()
            .values()
            .filter(|stat| self.config.inclusion.includes(stat))
            .count();

        Ok(StatusReport {
            outgoing_cursor: state.progress.outgoing.cursor,
            incoming_cursor: state.progress.incoming.cursor,
            outgoing_complete: state.progress.outgoing.complete,
            incoming_complete: state.progress.incoming.complete,
            processed_outgoing: state.processed.len(Direction::Outgoing),
            processed_incoming: state.processed.len(Direction::Incoming),
            correspondents: state.stats().len(),
            qualifying,
        })
    }

    /// Delete the checkpoint. Returns whether one existed.
    pub fn reset(&self) -> Result<bool, RosterError> {
        Ok(self.checkpoints().reset()?)
    }

    fn address_book_records(&self) -> Vec<AddressBookRecord> {
        let Some(book) = self.address_book else {
            return Vec::new();
        };
        match book.records() {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!("Address book skipped, using statistics only: {}", e);
                Vec::new()
            }
        }
    }

    fn export_state(
        &self,
        state: &ScanState,
        filter: &ExclusionFilter,
    ) -> Result<ExportSummary, RosterError> {
        let records = self.address_book_records();
        let normalizer = self.config.phone_normalizer();
        let resolver =
            Resolver::new(self.config.inclusion.clone(), &normalizer).with_exclusions(filter);

        let candidates = resolver.candidates(state.stats(), &records).len();
        let contacts = resolver.resolve(state.stats(), &records);
        let rendered = render(&contacts);

        self.output_store
            .write(&self.config.vcard_name, &rendered.vcard)?;
        self.output_store.write(&self.config.csv_name, &rendered.csv)?;

        Ok(ExportSummary {
            candidates,
            contacts: rendered.exported,
            vcard_name: self.config.vcard_name.clone(),
            csv_name: self.config.csv_name.clone(),
        })
    }
}
