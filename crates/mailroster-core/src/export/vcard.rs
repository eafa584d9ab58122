//! vCard 3.0 writer

use super::CRLF;
use crate::resolve::ContactRecord;

/// Escape text for a vCard property value.
pub fn escape(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('\n', "\\n")
        .replace(';', "\\;")
        .replace(',', "\\,")
}

/// One card per record, CRLF line endings. No records, no output.
pub fn to_vcard(records: &[&ContactRecord]) -> String {
    let mut vcf = String::new();
    for record in records {
        let mut push = |line: String| {
            vcf.push_str(&line);
            vcf.push_str(CRLF);
        };

        push("BEGIN:VCARD".to_string());
        push("VERSION:3.0".to_string());
        push(format!("FN:{}", escape(&record.display_name)));
        if !record.first_name.is_empty() || !record.last_name.is_empty() {
            push(format!(
                "N:{};{};;;",
                escape(&record.last_name),
                escape(&record.first_name)
            ));
        }
        for email in &record.emails {
            push(format!("EMAIL;TYPE=INTERNET:{}", escape(email)));
        }
        for phone in &record.phones {
            push(format!("TEL;TYPE=CELL:{}", escape(phone)));
        }
        push("END:VCARD".to_string());
    }
    vcf
}
