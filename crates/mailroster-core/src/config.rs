//! Run configuration

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::budget::Deadline;
use crate::error::ConfigError;
use crate::resolve::PhoneNormalizer;
use crate::scan::{ExclusionFilter, DEFAULT_EXCLUSION_PATTERNS};
use crate::store::CorrespondentStat;
use crate::Direction;

/// Operator-facing controls for one invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Default country code for phones written without one, e.g. `+61`
    pub country_code: String,
    /// Phones with fewer digits than this are dropped
    pub min_phone_digits: usize,
    /// Wall-clock budget for one run
    pub budget_secs: u64,
    /// How long before the budget a run starts winding down
    pub safety_margin_secs: u64,
    /// Message groups per archive page
    pub page_size: usize,
    /// Soft cap on groups traversed per query per run
    pub traversal_cap: usize,
    /// Case-insensitive regexes for automated senders
    pub exclusion_patterns: Vec<String>,
    pub outgoing_query: String,
    pub incoming_query: String,
    pub checkpoint_name: String,
    pub vcard_name: String,
    pub csv_name: String,
    pub inclusion: InclusionRule,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            country_code: "+61".to_string(),
            min_phone_digits: 8,
            budget_secs: 280,
            safety_margin_secs: 5,
            page_size: 200,
            traversal_cap: 3000,
            exclusion_patterns: DEFAULT_EXCLUSION_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect(),
            outgoing_query: "in:sent".to_string(),
            incoming_query: "in:inbox OR in:all".to_string(),
            checkpoint_name: "mailroster.checkpoint.json".to_string(),
            vcard_name: "contacts.vcf".to_string(),
            csv_name: "contacts.csv".to_string(),
            inclusion: InclusionRule::default(),
        }
    }
}

impl RunConfig {
    /// Load a JSON config file; absent fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: RunConfig = serde_json::from_str(&text)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::ZeroPageSize);
        }
        if self.traversal_cap == 0 {
            return Err(ConfigError::ZeroTraversalCap);
        }
        if !self.country_code.chars().any(|c| c.is_ascii_digit()) {
            return Err(ConfigError::CountryCode(self.country_code.clone()));
        }
        self.exclusion_filter()?;
        Ok(())
    }

    pub fn exclusion_filter(&self) -> Result<ExclusionFilter, ConfigError> {
        ExclusionFilter::new(&self.exclusion_patterns)
    }

    pub fn phone_normalizer(&self) -> PhoneNormalizer {
        PhoneNormalizer::new(&self.country_code, self.min_phone_digits)
    }

    /// Start the clock for this run.
    pub fn deadline(&self) -> Deadline {
        Deadline::start(
            Duration::from_secs(self.budget_secs),
            Duration::from_secs(self.safety_margin_secs),
        )
    }

    pub fn query(&self, direction: Direction) -> &str {
        match direction {
            Direction::Outgoing => &self.outgoing_query,
            Direction::Incoming => &self.incoming_query,
        }
    }
}

/// Which correspondents are worth turning into contacts.
///
/// A correspondent qualifies when the operator wrote to them at least
/// `min_sent` times, or when the conversation went both ways.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InclusionRule {
    pub min_sent: u64,
    pub min_sent_with_replies: u64,
    pub min_received_with_replies: u64,
}

impl Default for InclusionRule {
    fn default() -> Self {
        Self {
            min_sent: 2,
            min_sent_with_replies: 1,
            min_received_with_replies: 1,
        }
    }
}

impl InclusionRule {
    pub fn includes(&self, stat: &CorrespondentStat) -> bool {
        stat.sent >= self.min_sent
            || (stat.sent >= self.min_sent_with_replies
                && stat.received >= self.min_received_with_replies)
    }
}
