//! Candidate construction, union-find merging and canonicalization

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::hash::Hash;

use super::address_book::AddressBookRecord;
use super::disjoint_set::DisjointSet;
use super::names::{longest, split_first_last, title_case_name};
use super::phone::PhoneNormalizer;
use crate::config::InclusionRule;
use crate::scan::ExclusionFilter;
use crate::store::CorrespondentStat;

/// A provisional contact before merging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactNode {
    /// Display names, first-seen order
    pub names: Vec<String>,
    pub first: String,
    pub last: String,
    pub emails: BTreeSet<String>,
    pub phones: BTreeSet<String>,
}

impl ContactNode {
    pub fn add_name(&mut self, name: String) {
        if !name.is_empty() && !self.names.contains(&name) {
            self.names.push(name);
        }
    }

    /// How much identity this node carries; the richer node wins a merge.
    pub fn score(&self) -> usize {
        self.emails.len()
            + self.phones.len()
            + self.names.len()
            + usize::from(!self.first.is_empty())
            + usize::from(!self.last.is_empty())
    }

    /// Fold `other` in. First and last names are only filled when missing.
    fn absorb(&mut self, other: &ContactNode) {
        for name in &other.names {
            self.add_name(name.clone());
        }
        if self.first.is_empty() && !other.first.is_empty() {
            self.first = other.first.clone();
        }
        if self.last.is_empty() && !other.last.is_empty() {
            self.last = other.last.clone();
        }
        self.emails.extend(other.emails.iter().cloned());
        self.phones.extend(other.phones.iter().cloned());
    }

    fn display_name(&self) -> String {
        if !self.first.is_empty() || !self.last.is_empty() {
            return [self.first.as_str(), self.last.as_str()]
                .iter()
                .filter(|part| !part.is_empty())
                .copied()
                .collect::<Vec<_>>()
                .join(" ");
        }

        let best = longest(self.names.iter().map(String::as_str))
            .map(title_case_name)
            .unwrap_or_default();
        if !best.is_empty() {
            return best;
        }

        self.emails
            .iter()
            .next()
            .or_else(|| self.phones.iter().next())
            .cloned()
            .unwrap_or_default()
    }
}

/// A canonical, deduplicated contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactRecord {
    pub first_name: String,
    pub last_name: String,
    pub display_name: String,
    pub names: Vec<String>,
    /// Sorted
    pub emails: Vec<String>,
    /// Sorted, normalized
    pub phones: Vec<String>,
}

/// Candidate nodes plus the disjoint-set forest that tracks their merges.
///
/// Scoped to one resolution; nothing here is persisted.
#[derive(Debug, Clone)]
pub struct ContactForest {
    nodes: Vec<ContactNode>,
    sets: DisjointSet,
}

impl ContactForest {
    pub fn new(nodes: Vec<ContactNode>) -> Self {
        let sets = DisjointSet::new(nodes.len());
        Self { nodes, sets }
    }

    pub fn representative(&mut self, node: usize) -> usize {
        self.sets.find(node)
    }

    pub fn node(&self, index: usize) -> &ContactNode {
        &self.nodes[index]
    }

    /// Merge the sets holding `left` and `right` and return the surviving root.
    ///
    /// The root with the higher score wins; on a tie `left` wins. The loser's
    /// data is folded into the winner.
    pub fn union(&mut self, left: usize, right: usize) -> usize {
        let a = self.sets.find(left);
        let b = self.sets.find(right);
        if a == b {
            return a;
        }

        let (winner, loser) = if self.nodes[a].score() >= self.nodes[b].score() {
            (a, b)
        } else {
            (b, a)
        };
        self.sets.attach(loser, winner);
        let folded = self.nodes[loser].clone();
        self.nodes[winner].absorb(&folded);
        winner
    }

    /// Union every node with the earlier owner of any key it shares.
    fn merge_on<K, F>(&mut self, keys: F)
    where
        K: Eq + Hash,
        F: Fn(&ContactNode) -> Vec<K>,
    {
        let mut owners: HashMap<K, usize> = HashMap::new();
        for i in 0..self.nodes.len() {
            for key in keys(&self.nodes[i]) {
                let root = match owners.get(&key) {
                    Some(&owner) => self.union(owner, i),
                    None => self.sets.find(i),
                };
                owners.insert(key, root);
            }
        }
    }

    /// Email pass, then phone pass, then full-name pass.
    pub fn merge_all(&mut self) {
        self.merge_on(|n| n.emails.iter().cloned().collect());
        self.merge_on(|n| n.phones.iter().cloned().collect());
        self.merge_on(|n| {
            if n.first.is_empty() || n.last.is_empty() {
                Vec::new()
            } else {
                vec![(n.first.clone(), n.last.clone())]
            }
        });
    }

    /// One record per set, ordered by each set's lowest node index.
    /// Sets without any email or phone are dropped.
    pub fn into_records(mut self) -> Vec<ContactRecord> {
        let mut clusters: Vec<ContactNode> = Vec::new();
        let mut slots: HashMap<usize, usize> = HashMap::new();

        for i in 0..self.nodes.len() {
            let root = self.sets.find(i);
            let slot = *slots.entry(root).or_insert_with(|| {
                clusters.push(ContactNode::default());
                clusters.len() - 1
            });
            clusters[slot].absorb(&self.nodes[i]);
        }

        clusters
            .into_iter()
            .filter(|c| !c.emails.is_empty() || !c.phones.is_empty())
            .map(|c| ContactRecord {
                display_name: c.display_name(),
                first_name: c.first,
                last_name: c.last,
                names: c.names,
                emails: c.emails.into_iter().collect(),
                phones: c.phones.into_iter().collect(),
            })
            .collect()
    }
}

/// Builds candidates from statistics and address-book records and merges them.
pub struct Resolver<'a> {
    inclusion: InclusionRule,
    normalizer: &'a PhoneNormalizer,
    filter: Option<&'a ExclusionFilter>,
}

impl<'a> Resolver<'a> {
    pub fn new(inclusion: InclusionRule, normalizer: &'a PhoneNormalizer) -> Self {
        Self {
            inclusion,
            normalizer,
            filter: None,
        }
    }

    /// Drop address-book emails matching the automated-sender filter.
    pub fn with_exclusions(mut self, filter: &'a ExclusionFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    fn node_from_stat(&self, email: &str, stat: &CorrespondentStat) -> ContactNode {
        let mut node = ContactNode::default();
        node.emails.insert(email.to_lowercase());

        // Without an observed name the address itself stands in
        let best = stat
            .best_name()
            .map(str::to_string)
            .unwrap_or_else(|| email.to_lowercase());
        let display = title_case_name(&best);
        let (first, last) = split_first_last(&display);
        node.add_name(display);
        node.first = first;
        node.last = last;
        node
    }

    fn node_from_record(&self, record: &AddressBookRecord) -> ContactNode {
        let mut node = ContactNode::default();

        let display = record.display_name.trim();
        if !display.is_empty() {
            node.add_name(title_case_name(display));
        }
        node.first = title_case_name(record.given_name.trim());
        node.last = title_case_name(record.family_name.trim());

        for email in &record.emails {
            let email = email.trim().to_lowercase();
            if email.is_empty() || self.filter.is_some_and(|f| f.is_excluded(&email)) {
                continue;
            }
            node.emails.insert(email);
        }
        node.phones = record
            .phones
            .iter()
            .filter_map(|raw| self.normalizer.normalize(raw))
            .collect();
        node
    }

    /// Statistics candidates first (sorted by email), then address-book
    /// candidates in feed order.
    pub fn candidates(
        &self,
        stats: &BTreeMap<String, CorrespondentStat>,
        records: &[AddressBookRecord],
    ) -> Vec<ContactNode> {
        let mut nodes: Vec<ContactNode> = stats
            .iter()
            .filter(|(_, stat)| self.inclusion.includes(stat))
            .map(|(email, stat)| self.node_from_stat(email, stat))
            .collect();
        nodes.extend(records.iter().map(|r| self.node_from_record(r)));
        nodes
    }

    pub fn resolve(
        &self,
        stats: &BTreeMap<String, CorrespondentStat>,
        records: &[AddressBookRecord],
    ) -> Vec<ContactRecord> {
        let nodes = self.candidates(stats, records);
        let candidate_count = nodes.len();

        let mut forest = ContactForest::new(nodes);
        forest.merge_all();
        let contacts = forest.into_records();

        tracing::info!(
            "Resolved {} candidates ({} from address book) into {} contacts",
            candidate_count,
            records.len(),
            contacts.len()
        );
        contacts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::ExclusionFilter;

    fn node(emails: &[&str], phones: &[&str]) -> ContactNode {
        ContactNode {
            emails: emails.iter().map(|e| e.to_string()).collect(),
            phones: phones.iter().map(|p| p.to_string()).collect(),
            ..Default::default()
        }
    }

    fn named(first: &str, last: &str, emails: &[&str]) -> ContactNode {
        ContactNode {
            first: first.to_string(),
            last: last.to_string(),
            ..node(emails, &[])
        }
    }

    fn merged(nodes: Vec<ContactNode>) -> Vec<ContactRecord> {
        let mut forest = ContactForest::new(nodes);
        forest.merge_all();
        forest.into_records()
    }

    fn stat(sent: u64, received: u64, names: &[&str]) -> CorrespondentStat {
        let mut stat = CorrespondentStat::default();
        stat.sent = sent;
        stat.received = received;
        for name in names {
            stat.observe_name(name);
        }
        stat
    }

    #[test]
    fn test_shared_email_merges() {
        let records = merged(vec![
            node(&["a@x.com"], &[]),
            node(&["b@x.com"], &[]),
            node(&["a@x.com", "c@x.com"], &[]),
        ]);

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].emails, vec!["a@x.com", "c@x.com"]);
        assert_eq!(records[1].emails, vec!["b@x.com"]);
    }

    #[test]
    fn test_transitive_email_phone_merge() {
        let records = merged(vec![
            node(&["a@x.com"], &[]),
            node(&[], &["+61412345678"]),
            node(&["a@x.com"], &["+61412345678"]),
        ]);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].emails, vec!["a@x.com"]);
        assert_eq!(records[0].phones, vec!["+61412345678"]);
    }

    #[test]
    fn test_tie_goes_to_left_operand() {
        let mut forest = ContactForest::new(vec![node(&["a@x.com"], &[]), node(&["b@x.com"], &[])]);
        assert_eq!(forest.union(0, 1), 0);
        assert_eq!(forest.representative(1), 0);
        assert_eq!(forest.node(0).emails.len(), 2);

        let mut forest = ContactForest::new(vec![node(&["a@x.com"], &[]), node(&["b@x.com"], &[])]);
        assert_eq!(forest.union(1, 0), 1);
    }

    #[test]
    fn test_higher_score_wins() {
        let mut forest = ContactForest::new(vec![
            node(&["a@x.com"], &[]),
            named("Bo", "Li", &["b@x.com"]),
        ]);
        assert_eq!(forest.union(0, 1), 1);
        assert_eq!(forest.representative(0), 1);
    }

    #[test]
    fn test_merge_pass_keeps_first_constructed_on_tie() {
        let mut forest = ContactForest::new(vec![node(&["a@x.com"], &[]), node(&["a@x.com"], &[])]);
        forest.merge_all();
        assert_eq!(forest.representative(1), 0);
    }

    #[test]
    fn test_full_name_pass() {
        let records = merged(vec![
            named("Jane", "Doe", &["jane@work.com"]),
            named("Jane", "", &["jane@home.com"]),
            named("Jane", "Doe", &["jd@home.com"]),
        ]);

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].emails, vec!["jane@work.com", "jd@home.com"]);
        assert_eq!(records[0].display_name, "Jane Doe");
        assert_eq!(records[1].display_name, "Jane");
    }

    #[test]
    fn test_records_without_email_or_phone_are_dropped() {
        let mut nameless = named("Ghost", "Person", &[]);
        nameless.add_name("Ghost Person".to_string());
        let records = merged(vec![nameless, node(&["a@x.com"], &[])]);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].emails, vec!["a@x.com"]);
    }

    #[test]
    fn test_display_name_fallbacks() {
        let mut only_names = node(&["a@x.com"], &[]);
        only_names.add_name("jo".to_string());
        only_names.add_name("joanna bloggs".to_string());
        assert_eq!(merged(vec![only_names])[0].display_name, "Joanna Bloggs");

        assert_eq!(merged(vec![node(&["z@x.com"], &["+61400000000"])])[0].display_name, "z@x.com");
        assert_eq!(merged(vec![node(&[], &["+61400000000"])])[0].display_name, "+61400000000");
    }

    #[test]
    fn test_candidates_follow_inclusion_rule() {
        let normalizer = PhoneNormalizer::new("+61", 8);
        let resolver = Resolver::new(InclusionRule::default(), &normalizer);

        let mut stats = BTreeMap::new();
        stats.insert("alice@x.com".to_string(), stat(2, 0, &["alice smith", "Al"]));
        stats.insert("bob@x.com".to_string(), stat(1, 0, &["Bob"]));
        stats.insert("carol@x.com".to_string(), stat(1, 1, &[]));

        let nodes = resolver.candidates(&stats, &[]);
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].names, vec!["Alice Smith"]);
        assert_eq!((nodes[0].first.as_str(), nodes[0].last.as_str()), ("Alice", "Smith"));
        assert_eq!(nodes[1].names, vec!["Carol@x.com"]);
        assert_eq!((nodes[1].first.as_str(), nodes[1].last.as_str()), ("Carol@x.com", ""));

        let records = resolver.resolve(&stats, &[]);
        assert_eq!(records[1].display_name, "Carol@x.com");
    }

    #[test]
    fn test_address_book_candidates() {
        let normalizer = PhoneNormalizer::new("+61", 8);
        let filter = ExclusionFilter::default();
        let resolver = Resolver::new(InclusionRule::default(), &normalizer).with_exclusions(&filter);

        let record = AddressBookRecord {
            given_name: " jane ".to_string(),
            family_name: "o'neil".to_string(),
            display_name: "jane o'neil".to_string(),
            emails: vec!["Jane@X.com".to_string(), "noreply@x.com".to_string(), " ".to_string()],
            phones: vec!["0412 345 678".to_string(), "123".to_string()],
        };

        let nodes = resolver.candidates(&BTreeMap::new(), &[record]);
        assert_eq!(nodes.len(), 1);
        let node = &nodes[0];
        assert_eq!(node.first, "Jane");
        assert_eq!(node.last, "O'Neil");
        assert_eq!(node.names, vec!["Jane O'Neil"]);
        assert_eq!(node.emails.iter().collect::<Vec<_>>(), ["jane@x.com"]);
        assert_eq!(node.phones.iter().collect::<Vec<_>>(), ["+61412345678"]);
    }

    #[test]
    fn test_stats_and_address_book_merge_on_email() {
        let normalizer = PhoneNormalizer::new("+61", 8);
        let resolver = Resolver::new(InclusionRule::default(), &normalizer);

        let mut stats = BTreeMap::new();
        stats.insert("jane@x.com".to_string(), stat(3, 0, &["J. Doe"]));
        let book = vec![AddressBookRecord {
            given_name: "Jane".to_string(),
            family_name: "Doe".to_string(),
            emails: vec!["jane@x.com".to_string()],
            phones: vec!["0412345678".to_string()],
            ..Default::default()
        }];

        let records = resolver.resolve(&stats, &book);
        assert_eq!(records.len(), 1);
        // First/last come from the first member that has them
        assert_eq!(records[0].first_name, "J.");
        assert_eq!(records[0].last_name, "Doe");
        assert_eq!(records[0].phones, vec!["+61412345678"]);
    }

    #[test]
    fn test_output_follows_lowest_member_index() {
        let records = merged(vec![
            node(&["b@x.com"], &[]),
            node(&["a@x.com"], &[]),
            node(&["c@x.com", "b@x.com"], &[]),
        ]);
        assert_eq!(records[0].emails, vec!["b@x.com", "c@x.com"]);
        assert_eq!(records[1].emails, vec!["a@x.com"]);
    }
}
