//! Message archive interface and local implementations

use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::path::Path;

use crate::error::ArchiveError;

/// A single message's addressing headers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub cc: String,
    #[serde(default)]
    pub bcc: String,
    #[serde(default)]
    pub draft: bool,
}

impl Message {
    pub fn recipient_headers(&self) -> [&str; 3] {
        [&self.to, &self.cc, &self.bcc]
    }
}

/// A conversation thread with a stable ID.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageGroup {
    pub id: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub messages: Vec<Message>,
}

/// Paginated read access to a mailbox.
///
/// Calls are synchronous and have no timeout of their own; a hung call
/// stalls the run.
pub trait Archive {
    /// Address of the mailbox owner.
    fn account(&self) -> Result<String, ArchiveError>;

    /// Groups matching `query`, starting at `offset`, at most `page_size` of them.
    fn search(
        &self,
        query: &str,
        offset: usize,
        page_size: usize,
    ) -> Result<Vec<MessageGroup>, ArchiveError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Term {
    All,
    Label(String),
}

/// `in:<label>` terms joined by `OR`; `in:all` matches everything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    terms: Vec<Term>,
}

impl Query {
    pub fn parse(query: &str) -> Result<Self, ArchiveError> {
        let invalid = |reason: &str| ArchiveError::InvalidQuery {
            query: query.to_string(),
            reason: reason.to_string(),
        };

        let mut terms = Vec::new();
        for raw in query.split(" OR ") {
            let raw = raw.trim();
            let label = raw
                .strip_prefix("in:")
                .ok_or_else(|| invalid("expected `in:<label>`"))?
                .trim()
                .to_lowercase();
            if label.is_empty() {
                return Err(invalid("empty label"));
            }
            terms.push(if label == "all" {
                Term::All
            } else {
                Term::Label(label)
            });
        }
        Ok(Self { terms })
    }

    pub fn matches(&self, group: &MessageGroup) -> bool {
        self.terms.iter().any(|term| match term {
            Term::All => true,
            Term::Label(label) => group.labels.iter().any(|l| l.eq_ignore_ascii_case(label)),
        })
    }
}

fn page_of(
    groups: &[MessageGroup],
    query: &str,
    offset: usize,
    page_size: usize,
) -> Result<Vec<MessageGroup>, ArchiveError> {
    let query = Query::parse(query)?;
    Ok(groups
        .iter()
        .filter(|g| query.matches(g))
        .skip(offset)
        .take(page_size)
        .cloned()
        .collect())
}

/// An archive exported to a JSON file:
/// `{"account": "...", "groups": [{"id", "labels", "messages"}]}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonArchive {
    pub account: String,
    #[serde(default)]
    pub groups: Vec<MessageGroup>,
}

impl JsonArchive {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ArchiveError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let archive: JsonArchive = serde_json::from_str(&text)?;
        tracing::info!(
            "Opened archive {} for {} ({} groups)",
            path.as_ref().display(),
            archive.account,
            archive.groups.len()
        );
        Ok(archive)
    }
}

impl Archive for JsonArchive {
    fn account(&self) -> Result<String, ArchiveError> {
        Ok(self.account.clone())
    }

    fn search(
        &self,
        query: &str,
        offset: usize,
        page_size: usize,
    ) -> Result<Vec<MessageGroup>, ArchiveError> {
        page_of(&self.groups, query, offset, page_size)
    }
}

/// In-memory archive that counts searches and can be told to fail.
#[derive(Debug, Default)]
pub struct MemoryArchive {
    account: String,
    groups: Vec<MessageGroup>,
    searches: Cell<usize>,
    fail_after: Option<usize>,
}

impl MemoryArchive {
    pub fn new(account: impl Into<String>, groups: Vec<MessageGroup>) -> Self {
        Self {
            account: account.into(),
            groups,
            ..Default::default()
        }
    }

    /// Make every search after the first `searches` fail.
    pub fn failing_after(mut self, searches: usize) -> Self {
        self.fail_after = Some(searches);
        self
    }

    pub fn push(&mut self, group: MessageGroup) {
        self.groups.push(group);
    }

    pub fn search_count(&self) -> usize {
        self.searches.get()
    }
}

impl Archive for MemoryArchive {
    fn account(&self) -> Result<String, ArchiveError> {
        Ok(self.account.clone())
    }

    fn search(
        &self,
        query: &str,
        offset: usize,
        page_size: usize,
    ) -> Result<Vec<MessageGroup>, ArchiveError> {
        let count = self.searches.get();
        self.searches.set(count + 1);
        if matches!(self.fail_after, Some(limit) if count >= limit) {
            return Err(ArchiveError::Query(format!(
                "simulated failure at offset {}",
                offset
            )));
        }
        page_of(&self.groups, query, offset, page_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn group(id: &str, labels: &[&str]) -> MessageGroup {
        MessageGroup {
            id: id.to_string(),
            labels: labels.iter().map(|l| l.to_string()).collect(),
            messages: vec![],
        }
    }

    #[test]
    fn test_query_parsing() {
        let q = Query::parse("in:inbox OR in:all").unwrap();
        assert!(q.matches(&group("a", &[])));

        let q = Query::parse("in:Sent").unwrap();
        assert!(q.matches(&group("a", &["SENT"])));
        assert!(!q.matches(&group("b", &["inbox"])));

        assert!(Query::parse("from:bob").is_err());
        assert!(Query::parse("in:").is_err());
    }

    #[test]
    fn test_pagination_follows_file_order() {
        let archive = MemoryArchive::new(
            "me@x.com",
            vec![
                group("1", &["sent"]),
                group("2", &["inbox"]),
                group("3", &["sent"]),
                group("4", &["sent"]),
            ],
        );

        let page = archive.search("in:sent", 1, 2).unwrap();
        let ids: Vec<_> = page.iter().map(|g| g.id.as_str()).collect();
        assert_eq!(ids, ["3", "4"]);
        assert!(archive.search("in:sent", 3, 2).unwrap().is_empty());
        assert_eq!(archive.search_count(), 2);
    }

    #[test]
    fn test_simulated_failure() {
        let archive = MemoryArchive::new("me@x.com", vec![group("1", &["sent"])]).failing_after(1);
        assert!(archive.search("in:sent", 0, 10).is_ok());
        assert!(matches!(
            archive.search("in:sent", 0, 10),
            Err(ArchiveError::Query(_))
        ));
    }

    #[test]
    fn test_json_archive_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"account":"me@x.com","groups":[{{"id":"t1","labels":["sent"],
                "messages":[{{"from":"me@x.com","to":"a@x.com","draft":false}}]}}]}}"#
        )
        .unwrap();

        let archive = JsonArchive::open(file.path()).unwrap();
        assert_eq!(archive.account().unwrap(), "me@x.com");
        let page = archive.search("in:sent", 0, 10).unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].messages[0].to, "a@x.com");
        assert_eq!(page[0].messages[0].cc, "");
    }
}
