//! Phone number canonicalization
//!
//! Free-form phone text becomes `+<digits>` given a default country code.
//! Numbers written in national form are converted by a [`RegionRule`] looked
//! up in a [`RegionTable`]; countries without a registered rule use the
//! generic trunk-zero rule. Output of [`PhoneNormalizer::normalize`] is
//! stable under re-normalization.

use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

fn re_extension() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\s*(ext\.?|x|#)\s*[0-9]+$").unwrap())
}

pub fn count_digits(s: &str) -> usize {
    s.chars().filter(|c| c.is_ascii_digit()).count()
}

/// Converts a national-format number (digits only) to international form.
pub trait RegionRule: Send + Sync {
    /// `national` holds only ASCII digits; `country_digits` is the default
    /// country code without its `+`. Returns a `+`-prefixed candidate.
    fn localize(&self, national: &str, country_digits: &str) -> String;
}

/// Strip trunk zeros and prefix the country code; numbers that already
/// start with the country digits only gain a `+`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericRule;

impl RegionRule for GenericRule {
    fn localize(&self, national: &str, country_digits: &str) -> String {
        if national.starts_with('0') {
            format!("+{}{}", country_digits, national.trim_start_matches('0'))
        } else if !country_digits.is_empty() && national.starts_with(country_digits) {
            format!("+{}", national)
        } else {
            format!("+{}{}", country_digits, national)
        }
    }
}

/// Australia (+61).
#[derive(Debug, Clone, Copy, Default)]
pub struct AustralianRule;

impl RegionRule for AustralianRule {
    fn localize(&self, national: &str, _country_digits: &str) -> String {
        // Mobiles are written 04xx xxx xxx; the trunk 0 gives way to +61
        if national.len() >= 9 && national.starts_with("04") {
            return format!("+61{}", &national[1..]);
        }
        if national.starts_with('0') {
            return format!("+61{}", national.trim_start_matches('0'));
        }
        // Service numbers (13xx, 1300, 1800) and everything else take +61 as-is
        format!("+61{}", national)
    }
}

/// Region rules keyed by country digits.
#[derive(Clone)]
pub struct RegionTable {
    rules: HashMap<String, Arc<dyn RegionRule>>,
    fallback: Arc<dyn RegionRule>,
}

impl RegionTable {
    /// A table with no region rules, only the generic fallback.
    pub fn empty() -> Self {
        Self {
            rules: HashMap::new(),
            fallback: Arc::new(GenericRule),
        }
    }

    pub fn register(&mut self, country_code: &str, rule: impl RegionRule + 'static) {
        self.rules
            .insert(country_digits(country_code), Arc::new(rule));
    }

    pub fn rule_for(&self, country_code: &str) -> Arc<dyn RegionRule> {
        self.rules
            .get(&country_digits(country_code))
            .cloned()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

impl Default for RegionTable {
    fn default() -> Self {
        let mut table = Self::empty();
        table.register("+61", AustralianRule);
        table
    }
}

impl std::fmt::Debug for RegionTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut codes: Vec<_> = self.rules.keys().collect();
        codes.sort();
        f.debug_struct("RegionTable").field("rules", &codes).finish()
    }
}

fn country_digits(country_code: &str) -> String {
    country_code.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Normalizes phones against one default country code.
#[derive(Clone)]
pub struct PhoneNormalizer {
    country_digits: String,
    min_digits: usize,
    rule: Arc<dyn RegionRule>,
}

impl PhoneNormalizer {
    pub fn new(country_code: &str, min_digits: usize) -> Self {
        Self::with_table(country_code, min_digits, &RegionTable::default())
    }

    pub fn with_table(country_code: &str, min_digits: usize, table: &RegionTable) -> Self {
        Self {
            country_digits: country_digits(country_code),
            min_digits,
            rule: table.rule_for(country_code),
        }
    }

    pub fn min_digits(&self) -> usize {
        self.min_digits
    }

    /// `+<digits>`, or `None` when the text holds too few digits.
    pub fn normalize(&self, raw: &str) -> Option<String> {
        let text = raw.trim();
        let text = re_extension().replace(text, "");

        let text = if text.starts_with("00") {
            format!("+{}", text.trim_start_matches('0'))
        } else {
            text.into_owned()
        };

        let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
        let candidate = if text.starts_with('+') {
            format!("+{}", digits)
        } else {
            if digits.is_empty() {
                return None;
            }
            self.rule.localize(&digits, &self.country_digits)
        };

        if count_digits(&candidate) >= self.min_digits {
            Some(candidate)
        } else {
            None
        }
    }
}

impl std::fmt::Debug for PhoneNormalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhoneNormalizer")
            .field("country_digits", &self.country_digits)
            .field("min_digits", &self.min_digits)
            .finish()
    }
}

/// One-off normalization with the default region table.
pub fn normalize_phone(raw: &str, country_code: &str, min_digits: usize) -> Option<String> {
    PhoneNormalizer::new(country_code, min_digits).normalize(raw)
}
