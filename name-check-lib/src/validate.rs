//! Name validation.
//!
//! Turns raw comma-separated input into the list of names worth looking up,
//! plus a reason for every token that was refused. Pure: the progress store
//! is consulted later by the dispatcher, not here.

use std::collections::HashSet;

use crate::types::{RejectReason, Rejection};

/// Longest name the hiscores accept.
pub const MAX_NAME_LEN: usize = 12;

/// Result of validating one batch of input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validation {
    /// Accepted names in input order, each at most once
    pub accepted: Vec<String>,
    /// Refused tokens in input order
    pub rejected: Vec<Rejection>,
}

/// Validate a single token.
///
/// The token is trimmed first. Empty tokens should be filtered out by the
/// caller; here they fail the length check.
///
/// # Examples
///
/// ```rust
/// use name_check_lib::{validate_name, RejectReason};
///
/// assert_eq!(validate_name(" john doe ").unwrap(), "john doe");
/// assert_eq!(validate_name("a!b"), Err(RejectReason::InvalidCharacters));
/// ```
pub fn validate_name(token: &str) -> Result<String, RejectReason> {
    let name = token.trim();

    let len = name.chars().count();
    if len == 0 || len > MAX_NAME_LEN {
        return Err(RejectReason::InvalidLength);
    }

    if !name.chars().all(is_allowed_char) {
        return Err(RejectReason::InvalidCharacters);
    }

    if !name.chars().any(char::is_alphanumeric) {
        return Err(RejectReason::OnlySpecialCharacters);
    }

    Ok(name.to_string())
}

/// Split comma-separated input and validate every token.
///
/// Empty tokens (including whitespace-only ones) are dropped silently.
/// A name that appears twice is accepted once, at its first position.
pub fn validate_names(raw: &str) -> Validation {
    let mut validation = Validation::default();
    let mut seen = HashSet::new();

    for token in raw.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            continue;
        }

        match validate_name(trimmed) {
            Ok(name) => {
                if seen.insert(name.clone()) {
                    validation.accepted.push(name);
                }
            }
            Err(reason) => validation.rejected.push(Rejection {
                token: trimmed.to_string(),
                reason,
            }),
        }
    }

    validation
}

/// Convert newline-separated text (e.g. a names file) into comma-separated input.
pub fn names_from_text(text: &str) -> String {
    text.replace('\r', "").replace('\n', ",")
}

fn is_allowed_char(c: char) -> bool {
    c.is_alphanumeric() || c == ' ' || c == '_' || c == '-'
}
