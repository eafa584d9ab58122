//! Entity resolution
//!
//! Correspondent statistics and address-book records become candidate
//! nodes, which are merged on shared emails, phones and full names into
//! canonical [`ContactRecord`]s.

pub mod address_book;
pub mod disjoint_set;
pub mod names;
pub mod phone;
pub mod resolver;

pub use address_book::{AddressBook, AddressBookRecord, JsonAddressBook};
pub use disjoint_set::DisjointSet;
pub use names::{split_first_last, title_case_name};
pub use phone::{normalize_phone, PhoneNormalizer, RegionRule, RegionTable};
pub use resolver::{ContactForest, ContactNode, ContactRecord, Resolver};
