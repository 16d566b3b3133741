//! Text normalization for name matching and identifier derivation
//!
//! Provides the normalization applied everywhere text enters the system:
//! - Unicode NFC normalization with whitespace collapse (`norm`)
//! - ASCII-folding slugification for identifier derivation (`slugify`)
//! - Case-preserving word slugs for deriving romanized forms (`slug_words`)

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Canonical text normalization: Unicode NFC, then whitespace collapse.
///
/// Leading and trailing whitespace is removed; internal runs of whitespace
/// (including newlines) become a single ASCII space.
///
/// # Examples
///
/// ```
/// use choros::normalize::norm;
///
/// assert_eq!(norm("  Moontown   Airport  "), "Moontown Airport");
/// assert_eq!(norm("Berry\nRoad"), "Berry Road");
/// ```
pub fn norm(value: &str) -> String {
    let composed: String = value.nfc().collect();
    composed.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Derive an identifier-safe slug from a display string.
///
/// NFKD-decomposes, strips combining marks, keeps ASCII alphanumerics
/// lowercased, and joins runs of everything else with single hyphens.
/// Text with no ASCII-representable characters yields an empty string;
/// callers treat that as a degenerate-identifier condition.
///
/// # Examples
///
/// ```
/// use choros::normalize::slugify;
///
/// assert_eq!(slugify("Moontown Airport"), "moontown-airport");
/// assert_eq!(slugify("Mù ēn dūn"), "mu-en-dun");
/// assert_eq!(slugify("3M5"), "3m5");
/// ```
pub fn slugify(value: &str) -> String {
    fold_ascii(value, true, "-")
}

/// Like [`slugify`] but case-preserving and space-separated.
///
/// Used when a romanized form must be derived from an attested form:
/// "Moontown Airport" stays "Moontown Airport", punctuation is dropped.
pub fn slug_words(value: &str) -> String {
    fold_ascii(value, false, " ")
}

fn fold_ascii(value: &str, lowercase: bool, separator: &str) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut current = String::new();
    for c in value.nfkd() {
        if is_combining_mark(c) {
            continue;
        }
        if c.is_ascii_alphanumeric() {
            if lowercase {
                current.push(c.to_ascii_lowercase());
            } else {
                current.push(c);
            }
        } else if !current.is_empty() {
            parts.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts.join(separator)
}
