use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use mailroster_core::{
	DirectoryBlobStore, JsonAddressBook, JsonArchive, Pipeline, RunConfig, RunOutcome, ScanEvent,
	SqliteBlobStore,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "mailroster", version, about = "Mailroster - build a contact list from your mailbox")]
struct Cli {
	#[command(subcommand)]
	command: Commands,
	/// Checkpoint database (default: ~/.mailroster/state.db)
	#[arg(long, global = true)]
	state: Option<PathBuf>,
	/// JSON run configuration; flags below override it
	#[arg(long, global = true)]
	config: Option<PathBuf>,
	/// Directory for contacts.vcf and contacts.csv
	#[arg(long, global = true, default_value = ".")]
	out: PathBuf,
	#[command(flatten)]
	overrides: Overrides,
}

#[derive(Args, Debug, Default)]
struct Overrides {
	/// Default country code for phones without one, e.g. +61
	#[arg(long, global = true)]
	country_code: Option<String>,
	/// Drop phones with fewer digits than this
	#[arg(long, global = true)]
	min_phone_digits: Option<usize>,
	/// Wall-clock budget per run, in seconds
	#[arg(long, global = true)]
	budget_secs: Option<u64>,
	/// Message groups per archive page
	#[arg(long, global = true)]
	page_size: Option<usize>,
	/// Groups traversed per query per run
	#[arg(long, global = true)]
	traversal_cap: Option<usize>,
}

impl Overrides {
	fn apply(&self, config: &mut RunConfig) {
		if let Some(code) = &self.country_code {
			config.country_code = code.clone();
		}
		if let Some(digits) = self.min_phone_digits {
			config.min_phone_digits = digits;
		}
		if let Some(secs) = self.budget_secs {
			config.budget_secs = secs;
		}
		if let Some(size) = self.page_size {
			config.page_size = size;
		}
		if let Some(cap) = self.traversal_cap {
			config.traversal_cap = cap;
		}
	}
}

#[derive(Subcommand, Debug)]
enum Commands {
	/// Scan the archive within the time budget and export once both scans finish
	Run {
		/// Mailbox archive (JSON)
		#[arg(long)]
		archive: PathBuf,
		/// Address book to merge in (JSON array of records)
		#[arg(long)]
		address_book: Option<PathBuf>,
	},
	/// Export contacts from the current checkpoint, finished or not
	Export {
		#[arg(long)]
		address_book: Option<PathBuf>,
	},
	/// Show checkpoint progress
	Status {
		/// Print as JSON
		#[arg(long)]
		json: bool,
	},
	/// Delete the checkpoint so the next run starts fresh
	Reset,
}

fn load_config(cli: &Cli) -> Result<RunConfig> {
	let mut config = match &cli.config {
		Some(path) => RunConfig::from_json_file(path)
			.with_context(|| format!("Failed to load config {}", path.display()))?,
		None => RunConfig::default(),
	};
	cli.overrides.apply(&mut config);
	config.validate().context("Invalid configuration")?;
	tracing::debug!("Effective config: {:?}", config);
	Ok(config)
}

fn open_state(cli: &Cli) -> Result<SqliteBlobStore> {
	let path = match &cli.state {
		Some(path) => path.clone(),
		None => SqliteBlobStore::default_path()?,
	};
	SqliteBlobStore::open(&path)
		.with_context(|| format!("Failed to open state database {}", path.display()))
}

fn create_spinner(message: &str) -> Result<Option<ProgressBar>> {
	if !atty::is(atty::Stream::Stderr) {
		return Ok(None);
	}
	let spinner = ProgressBar::new_spinner();
	spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
	spinner.set_message(message.to_string());
	spinner.enable_steady_tick(Duration::from_millis(100));
	Ok(Some(spinner))
}

fn main() -> Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.with_writer(std::io::stderr)
		.init();

	let cli = Cli::parse();
	let config = load_config(&cli)?;
	let state = open_state(&cli)?;
	let out = DirectoryBlobStore::new(&cli.out);

	match &cli.command {
		Commands::Run { archive, address_book } => {
			let archive = JsonArchive::open(archive)
				.with_context(|| format!("Failed to open archive {}", archive.display()))?;
			let book = address_book.as_ref().map(JsonAddressBook::new);

			let mut pipeline = Pipeline::new(config.clone(), &state, &out);
			if let Some(book) = &book {
				pipeline = pipeline.with_address_book(book);
			}

			let spinner = create_spinner("Scanning mailbox...")?;
			if let Some(spinner) = spinner.clone() {
				pipeline.set_progress_callback(move |event: &ScanEvent| {
					spinner.set_message(format!(
						"{} scan: cursor {}, {} new groups",
						event.direction, event.cursor, event.groups_processed
					));
				});
			}

			let outcome = pipeline.run(&archive, &config.deadline());
			if let Some(spinner) = &spinner {
				spinner.finish_and_clear();
			}

			match outcome? {
				RunOutcome::OutOfTime => {
					println!("⏱️  Time budget reached. Progress saved; run again to continue.");
				}
				RunOutcome::Incomplete => {
					println!("🔄 Scan incomplete. Progress saved; run again to continue.");
				}
				RunOutcome::Complete { contacts } => {
					println!("✅ Scan complete!");
					println!("📇 Contacts exported: {}", contacts);
					println!("📁 vCard: {}", out.path_for(&config.vcard_name).display());
					println!("📁 CSV: {}", out.path_for(&config.csv_name).display());
				}
			}
		}
		Commands::Export { address_book } => {
			let book = address_book.as_ref().map(JsonAddressBook::new);
			let mut pipeline = Pipeline::new(config.clone(), &state, &out);
			if let Some(book) = &book {
				pipeline = pipeline.with_address_book(book);
			}

			let summary = pipeline.export()?;
			println!("✅ Export complete!");
			println!("🧮 Candidates: {}", summary.candidates);
			println!("📇 Contacts exported: {}", summary.contacts);
			println!("📁 vCard: {}", out.path_for(&summary.vcard_name).display());
			println!("📁 CSV: {}", out.path_for(&summary.csv_name).display());
		}
		Commands::Status { json } => {
			let report = Pipeline::new(config, &state, &out).status()?;
			if *json {
				println!("{}", serde_json::to_string_pretty(&report)?);
			} else {
				let done = |complete: bool| if complete { "done" } else { "in progress" };
				println!("📊 Checkpoint: {}", state.path().display());
				println!(
					"📤 Outgoing: {} (cursor {}, {} groups processed)",
					done(report.outgoing_complete),
					report.outgoing_cursor,
					report.processed_outgoing
				);
				println!(
					"📥 Incoming: {} (cursor {}, {} groups processed)",
					done(report.incoming_complete),
					report.incoming_cursor,
					report.processed_incoming
				);
				println!("👥 Correspondents: {}", report.correspondents);
				println!("🎯 Qualifying: {}", report.qualifying);
			}
		}
		Commands::Reset => {
			if Pipeline::new(config, &state, &out).reset()? {
				println!("🗑️  Checkpoint deleted. Next run starts fresh.");
			} else {
				println!("ℹ️  No checkpoint to delete.");
			}
		}
	}
	Ok(())
}
