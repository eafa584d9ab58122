//! vCard and CSV rendering of resolved contacts

pub mod csv;
pub mod vcard;

use crate::resolve::ContactRecord;

pub(crate) const CRLF: &str = "\r\n";

/// Both output documents for one set of contacts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedContacts {
    pub vcard: String,
    pub csv: String,
    /// Records that produced a card and a row
    pub exported: usize,
}

/// Render every record that has at least one email or phone.
pub fn render(records: &[ContactRecord]) -> RenderedContacts {
    let exportable: Vec<&ContactRecord> = records
        .iter()
        .filter(|r| !r.emails.is_empty() || !r.phones.is_empty())
        .collect();

    RenderedContacts {
        vcard: vcard::to_vcard(&exportable),
        csv: csv::to_csv(&exportable),
        exported: exportable.len(),
    }
}
