//! Identifier engine
//!
//! Identifiers follow the W3C NCName grammar (xml:id rules) with two local
//! restrictions: no whitespace anywhere, and the value must already equal
//! its own normalization. `coerce` repairs near-miss candidates through a
//! fixed cascade of strategies; `uniquify` resolves collisions against an
//! existing identifier set with a numeric suffix.

use crate::error::IdError;
use crate::normalize::norm;

/// NameStartChar per XML 1.1, minus the colon (NCNameStartChar).
/// https://www.w3.org/TR/xml-names11/#NT-NCNameStartChar
fn is_ncname_start_char(c: char) -> bool {
    matches!(c,
        'A'..='Z'
        | '_'
        | 'a'..='z'
        | '\u{C0}'..='\u{D6}'
        | '\u{D8}'..='\u{F6}'
        | '\u{F8}'..='\u{2FF}'
        | '\u{370}'..='\u{37D}'
        | '\u{37F}'..='\u{1FFF}'
        | '\u{200C}'..='\u{200D}'
        | '\u{2070}'..='\u{218F}'
        | '\u{2C00}'..='\u{2FEF}'
        | '\u{3001}'..='\u{D7FF}'
        | '\u{F900}'..='\u{FDCF}'
        | '\u{FDF0}'..='\u{FFFD}'
        | '\u{10000}'..='\u{EFFFF}')
}

/// NameChar per XML 1.1, minus the colon (NCNameChar).
/// https://www.w3.org/TR/xml11/#NT-NameChar
fn is_ncname_char(c: char) -> bool {
    is_ncname_start_char(c)
        || matches!(c,
            '-' | '.' | '0'..='9' | '\u{B7}' | '\u{300}'..='\u{36F}' | '\u{203F}'..='\u{2040}')
}

/// Check whether a candidate is a valid identifier as-is.
///
/// Valid means: non-empty, equal to its own normalization, free of
/// whitespace, and an NCName (start char followed by name chars, colon
/// excluded throughout).
pub fn validate(value: &str) -> bool {
    if value.is_empty() {
        return false;
    }
    // Attribute-value normalization on xml:id: an identifier carrying
    // leading/trailing or repeated spaces is not in canonical form.
    if value != norm(value) {
        return false;
    }
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let mut chars = value.chars();
    match chars.next() {
        Some(c) if is_ncname_start_char(c) => {}
        _ => return false,
    }
    chars.all(is_ncname_char)
}

/// Repair a candidate into a valid identifier.
///
/// Strategies, in order: accept as-is; normalize; replace internal spaces
/// with hyphens; fail on empty-after-normalization; prefix an underscore
/// when the start char is disallowed; replace remaining disallowed chars
/// with dots. Exhausting every strategy without producing a valid token is
/// an error — never a silently-invalid identifier.
///
/// # Examples
///
/// ```
/// use choros::ident::coerce;
///
/// assert_eq!(coerce("moontown").unwrap(), "moontown");
/// assert_eq!(coerce("3M5").unwrap(), "_3M5");
/// assert_eq!(coerce("moontown:3M5").unwrap(), "moontown.3M5");
/// ```
pub fn coerce(value: &str) -> Result<String, IdError> {
    if validate(value) {
        return Ok(value.to_string());
    }

    let mut val = norm(value);
    if validate(&val) {
        return Ok(val);
    }

    val = val.replace(' ', "-");
    if validate(&val) {
        return Ok(val);
    }

    if val.is_empty() {
        return Err(IdError::Degenerate {
            original: value.to_string(),
        });
    }

    let first = val.chars().next().expect("non-empty checked above");
    if !is_ncname_start_char(first) {
        val.insert(0, '_');
    }
    if validate(&val) {
        return Ok(val);
    }

    let mut revised = String::with_capacity(val.len());
    let mut chars = val.chars();
    revised.push(chars.next().expect("non-empty checked above"));
    for c in chars {
        if is_ncname_char(c) {
            revised.push(c);
        } else {
            revised.push('.');
        }
    }
    if validate(&revised) {
        return Ok(revised);
    }

    Err(IdError::Unrepairable {
        original: value.to_string(),
    })
}

/// Make a candidate unique against an existing identifier set.
///
/// When the candidate already occurs, append `.{n}` for the smallest
/// positive integer n not taken by an existing `.N` sibling; otherwise
/// the candidate is returned unchanged.
pub fn uniquify<'a, I>(candidate: &str, existing: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut taken = false;
    let mut suffixes: Vec<u64> = Vec::new();
    let prefix = format!("{candidate}.");
    for id in existing {
        if id == candidate {
            taken = true;
        } else if let Some(rest) = id.strip_prefix(&prefix) {
            if let Ok(n) = rest.parse::<u64>() {
                suffixes.push(n);
            }
        }
    }
    if !taken {
        return candidate.to_string();
    }
    let mut n = 1;
    suffixes.sort_unstable();
    for taken_n in suffixes {
        if taken_n == n {
            n += 1;
        } else if taken_n > n {
            break;
        }
    }
    format!("{candidate}.{n}")
}
