//! Search keyword canonicalization.
//!
//! Every keyword entering the ranking cache or the event log goes through
//! [`normalize_keyword`] first, so "Crêpe", "crepe " and "CREPE" all land
//! in the same sorted-set member.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Shortest prefix bucket maintained for autocomplete.
pub const MIN_PREFIX_CHARS: usize = 1;
/// Longest prefix bucket maintained for autocomplete.
pub const MAX_PREFIX_CHARS: usize = 3;

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));

/// Canonicalize a raw search keyword: NFKD, strip combining marks,
/// lowercase, trim, collapse inner whitespace to single spaces.
///
/// Blank input yields an empty string; callers treat that as "nothing to
/// do" rather than an error.
pub fn normalize_keyword(raw: &str) -> String {
    let stripped: String = raw
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase();
    RE_WHITESPACE
        .replace_all(stripped.trim(), " ")
        .into_owned()
}

/// The 1..=3 leading-character prefixes of an already-normalized keyword.
/// Char-based, so multibyte scripts bucket correctly.
pub fn prefixes(normalized: &str) -> Vec<String> {
    let chars: Vec<char> = normalized.chars().collect();
    let longest = chars.len().min(MAX_PREFIX_CHARS);
    (MIN_PREFIX_CHARS..=longest)
        .map(|len| chars[..len].iter().collect())
        .collect()
}
