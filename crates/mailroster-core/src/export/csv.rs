//! CSV writer

use super::CRLF;
use crate::resolve::ContactRecord;

pub const HEADER: [&str; 5] = ["First Name", "Last Name", "Display Name", "Emails", "Phones"];

/// Quote a cell holding a comma, quote, CR or LF; inner quotes are doubled.
pub fn quote_cell(cell: &str) -> String {
    if cell.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

fn push_row<S: AsRef<str>>(csv: &mut String, cells: &[S]) {
    let row: Vec<String> = cells.iter().map(|c| quote_cell(c.as_ref())).collect();
    csv.push_str(&row.join(","));
    csv.push_str(CRLF);
}

/// Header plus one row per record. Emails and phones are joined with `"; "`.
pub fn to_csv(records: &[&ContactRecord]) -> String {
    let mut csv = String::new();
    push_row(&mut csv, &HEADER);
    for record in records {
        push_row(
            &mut csv,
            &[
                record.first_name.clone(),
                record.last_name.clone(),
                record.display_name.clone(),
                record.emails.join("; "),
                record.phones.join("; "),
            ],
        );
    }
    csv
}
