//! Person-name casing and splitting

/// Lowercase particles that stay lowercase unless they open the name.
const PARTICLES: &[&str] = &[
    "de", "da", "dos", "das", "do", "del", "della", "di", "van", "von", "der", "den", "la", "le",
    "du",
];

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Uppercase the letter right after `prefix` when it is an ASCII lowercase letter.
fn prefixed(word: &str, prefix: &str, replacement: &str) -> Option<String> {
    let rest = word.strip_prefix(prefix)?;
    let next = rest.chars().next().filter(|c| c.is_ascii_lowercase())?;
    Some(format!(
        "{}{}{}",
        replacement,
        next.to_ascii_uppercase(),
        &rest[next.len_utf8()..]
    ))
}

fn fix_word(word: &str, index: usize) -> String {
    let mut x = word.to_lowercase();

    if let Some(fixed) = prefixed(&x, "o'", "O'").or_else(|| prefixed(&x, "o\u{2019}", "O'")) {
        x = fixed;
    }
    if let Some(fixed) = prefixed(&x, "mc", "Mc") {
        x = fixed;
    }
    if let Some(fixed) = prefixed(&x, "mac", "Mac") {
        x = fixed;
    }

    let x = x.split('-').map(capitalize).collect::<Vec<_>>().join("-");

    if index > 0 && PARTICLES.contains(&x.to_lowercase().as_str()) {
        return x.to_lowercase();
    }
    capitalize(&x)
}

/// Title-case a personal name: "ludwig VAN beethoven" -> "Ludwig van Beethoven",
/// "mcdonald" -> "McDonald", "o'neil" -> "O'Neil", "jean-luc" -> "Jean-Luc".
pub fn title_case_name(name: &str) -> String {
    name.split_whitespace()
        .enumerate()
        .map(|(i, w)| fix_word(w, i))
        .collect::<Vec<_>>()
        .join(" ")
}

/// First and last whitespace-separated tokens, title-cased.
///
/// A single token is a first name only; middle tokens are dropped.
pub fn split_first_last(display: &str) -> (String, String) {
    let parts: Vec<&str> = display.split_whitespace().collect();
    match parts.as_slice() {
        [] => (String::new(), String::new()),
        [only] => (title_case_name(only), String::new()),
        [first, .., last] => (title_case_name(first), title_case_name(last)),
    }
}

/// The longest name by character count; the earliest wins a tie.
pub fn longest<'a>(names: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    let mut best: Option<&str> = None;
    for name in names {
        if name.is_empty() {
            continue;
        }
        if best.map_or(true, |b| name.chars().count() > b.chars().count()) {
            best = Some(name);
        }
    }
    best
}
