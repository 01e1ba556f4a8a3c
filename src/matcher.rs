//! Subject matching against wildcarded subscription patterns.
//!
//! Subjects are dot-segmented (`domain.entity.123`). A pattern token equal to
//! the wildcard matches exactly one segment, except in the final position where
//! it matches one or more remaining segments.

/// Default wildcard token.
pub const WILDCARD: char = '*';

/// Default segment separator.
pub const SEPARATOR: char = '.';

/// Match `subject` against `pattern`.
///
/// Tokens are compared case-sensitively, left to right.
///
/// ```
/// use resilient_events::matcher;
///
/// assert!(matcher::matches('*', '.', "domain.entity.*", "domain.entity.123.456"));
/// assert!(!matcher::matches('*', '.', "domain.entity.123.*", "domain.entity.123"));
/// ```
pub fn matches(wildcard: char, separator: char, pattern: &str, subject: &str) -> bool {
    let tokens: Vec<&str> = pattern.split(separator).collect();
    let segments: Vec<&str> = subject.split(separator).collect();
    let last = tokens.len() - 1;

    for (i, token) in tokens.iter().enumerate() {
        let Some(segment) = segments.get(i) else {
            return false;
        };

        if is_wildcard(token, wildcard) {
            if i == last {
                return true;
            }
            continue;
        }

        if token != segment {
            return false;
        }
    }

    segments.len() == tokens.len()
}

/// Match using the default `*` wildcard and `.` separator.
pub fn matches_default(pattern: &str, subject: &str) -> bool {
    matches(WILDCARD, SEPARATOR, pattern, subject)
}

fn is_wildcard(token: &str, wildcard: char) -> bool {
    let mut chars = token.chars();
    chars.next() == Some(wildcard) && chars.next().is_none()
}
