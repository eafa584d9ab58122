//! Header address parsing and automated-sender filtering.

use regex::{Regex, RegexBuilder};
use std::sync::OnceLock;

use crate::error::ConfigError;

/// Patterns for no-reply, bounce, notification and mailing-list senders.
pub const DEFAULT_EXCLUSION_PATTERNS: &[&str] = &[
    r"(^|\W)(no[-_. ]?reply|do[-_. ]?not[-_. ]?reply|donotreply)(@|$)",
    r"(mailer-daemon|postmaster|bounce|bounces|delivery|failure)",
    r"(noreply\+|noreply-)",
    r"(^|\W)(notifications?|notify|auto(mail|mated)?|robot|daemon)(@|$)",
    r"(unsubscribe|newsletter|listserv|list-manager)",
];

/// One address from a header. `name` is empty when the header had none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub email: String,
    pub name: String,
}

fn re_bare_email() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}").unwrap())
}

/// Parse a `To`/`Cc`/`Bcc`/`From` header into addresses, in header order.
///
/// Entries are separated by `,` or `;` outside quotes and angle brackets.
/// Each entry is either `"Name" <email>`, `Name <email>`, `<email>` or a
/// bare email. Anything else yields nothing.
pub fn extract_addresses(header: &str) -> impl Iterator<Item = Address> + '_ {
    Entries { rest: header }.flat_map(parse_entry)
}

struct Entries<'a> {
    rest: &'a str,
}

impl<'a> Iterator for Entries<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        loop {
            if self.rest.is_empty() {
                return None;
            }

            let mut in_quotes = false;
            let mut in_angle = false;
            let mut split_at = None;
            for (i, c) in self.rest.char_indices() {
                match c {
                    '"' if !in_angle => in_quotes = !in_quotes,
                    '<' if !in_quotes => in_angle = true,
                    '>' if !in_quotes => in_angle = false,
                    ',' | ';' if !in_quotes && !in_angle => {
                        split_at = Some(i);
                        break;
                    }
                    _ => {}
                }
            }

            let entry = match split_at {
                Some(i) => {
                    let entry = &self.rest[..i];
                    self.rest = &self.rest[i + 1..];
                    entry
                }
                None => std::mem::take(&mut self.rest),
            };

            let entry = entry.trim();
            if !entry.is_empty() {
                return Some(entry);
            }
        }
    }
}

fn parse_entry(entry: &str) -> Vec<Address> {
    if let Some(open) = entry.find('<') {
        if let Some(close) = entry[open..].find('>') {
            let email = entry[open + 1..open + close].trim();
            if email.contains('@') {
                let name = entry[..open].trim();
                let name = name.strip_prefix('"').unwrap_or(name);
                let name = name.strip_suffix('"').unwrap_or(name);
                return vec![Address {
                    email: email.to_string(),
                    name: name.trim().to_string(),
                }];
            }
        }
    }

    re_bare_email()
        .find_iter(entry)
        .map(|m| Address {
            email: m.as_str().to_string(),
            name: String::new(),
        })
        .collect()
}

/// Case-insensitive patterns matched against the full address.
#[derive(Debug, Clone)]
pub struct ExclusionFilter {
    patterns: Vec<Regex>,
}

impl ExclusionFilter {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, ConfigError> {
        let patterns = patterns
            .iter()
            .map(|p| {
                RegexBuilder::new(p.as_ref())
                    .case_insensitive(true)
                    .build()
                    .map_err(|source| ConfigError::Pattern {
                        pattern: p.as_ref().to_string(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn is_excluded(&self, email: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(email))
    }
}

impl Default for ExclusionFilter {
    fn default() -> Self {
        Self {
            patterns: DEFAULT_EXCLUSION_PATTERNS
                .iter()
                .map(|p| {
                    RegexBuilder::new(p)
                        .case_insensitive(true)
                        .build()
                        .unwrap()
                })
                .collect(),
        }
    }
}
