//! Object identifier and subscription pattern matching.
//!
//! Identifiers are `/`-delimited paths (`users/42/profile`). A pattern may
//! use [`WILDCARD`] in place of any segment; a wildcard matches exactly one
//! non-empty segment, so `users/*` matches `users/42` but neither `users`
//! nor `users/42/profile`.

use std::fmt;

use crate::errors::{Result, SyncError};

/// Segment separator for identifiers and patterns.
pub const SEPARATOR: char = '/';

/// Pattern segment matching any single non-empty identifier segment.
pub const WILDCARD: &str = "*";

/// Whether `pattern` matches the concrete `identifier`.
pub fn matches(pattern: &str, identifier: &str) -> bool {
    let mut pattern_segments = pattern.split(SEPARATOR);
    let mut id_segments = identifier.split(SEPARATOR);
    loop {
        match (pattern_segments.next(), id_segments.next()) {
            (None, None) => return true,
            (Some(p), Some(s)) => {
                let ok = if p == WILDCARD { !s.is_empty() } else { p == s };
                if !ok {
                    return false;
                }
            }
            _ => return false,
        }
    }
}

/// Whether `pattern` contains no wildcard segment.
pub fn is_exact(pattern: &str) -> bool {
    !pattern.split(SEPARATOR).any(|segment| segment == WILDCARD)
}

/// A validated subscription pattern.
///
/// Exact patterns name one identifier and are resolved by direct lookup;
/// wildcard patterns require scanning known identifiers.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ObjectPattern {
    raw: String,
    exact: bool,
}

impl ObjectPattern {
    /// Parse a pattern, rejecting empty input.
    pub fn parse(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(SyncError::InvalidPattern {
                pattern: raw,
                reason: "pattern is empty".into(),
            });
        }
        let exact = is_exact(&raw);
        Ok(Self { raw, exact })
    }

    /// The pattern as written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether the pattern has no wildcard segments.
    pub fn is_exact(&self) -> bool {
        self.exact
    }

    /// Whether this pattern matches `identifier`.
    pub fn matches(&self, identifier: &str) -> bool {
        if self.exact {
            self.raw == identifier
        } else {
            matches(&self.raw, identifier)
        }
    }
}

impl fmt::Display for ObjectPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
