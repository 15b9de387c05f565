//! The `Task` type and name-annotation parsing.

use std::collections::HashSet;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NameAnnotationError {
    /// `already_unrolled_count` only ever reads a single ASCII digit in the
    /// reference implementation; behavior for anything else is undefined
    /// there, so this crate rejects it outright rather than guessing.
    #[error("'{0}' has a malformed pre-unrolled suffix (expected exactly one digit after '/')")]
    MalformedUnrolledSuffix(String),
}

/// One realtime subroutine to be called periodically.
#[derive(Debug, Clone)]
pub struct Task {
    /// Name as it appears in the generated call sites, including a leading
    /// `!` if the task is an inline macro.
    pub name: String,
    pub period: u32,
    pub length: f64,
    pub already_unrolled_count: u32,
    /// Number of slots this task occupies, filled in as slots are placed.
    pub n_slots: u32,
}

impl Task {
    pub fn is_inline(&self) -> bool {
        self.name.starts_with('!')
    }

    /// The name sans the `!` inline marker.
    pub fn base_name(&self) -> &str {
        self.name.strip_prefix('!').unwrap_or(&self.name)
    }
}

/// The outcome of stripping annotations off a raw name token.
pub struct ParsedName {
    pub name: String,
    pub already_unrolled_count: u32,
}

/// Outcome of resolving the `?cond` suffix on a name token.
pub enum ConditionalOutcome {
    /// No conditional suffix, or the conditional is defined: processing
    /// continues with the (possibly stripped) name.
    Keep(String),
    /// The conditional suffix named an undefined conditional: the whole
    /// line must be skipped.
    Skip { conditional: String },
}

/// Strip a `?cond` suffix, per spec: this must happen before the `/d`
/// suffix is stripped.
pub fn strip_conditional(name: &str, conditionals: &HashSet<String>) -> ConditionalOutcome {
    match name.rfind('?') {
        None => ConditionalOutcome::Keep(name.to_owned()),
        Some(idx) => {
            let cond = &name[idx + 1..];
            if conditionals.contains(cond) {
                ConditionalOutcome::Keep(name[..idx].to_owned())
            } else {
                ConditionalOutcome::Skip {
                    conditional: cond.to_owned(),
                }
            }
        }
    }
}

/// Strip a trailing `/<digit>` pre-unrolled-variant-count suffix.
pub fn strip_unrolled_count(name: &str) -> Result<ParsedName, NameAnnotationError> {
    match name.rfind('/') {
        None => Ok(ParsedName {
            name: name.to_owned(),
            already_unrolled_count: 0,
        }),
        Some(idx) => {
            let suffix = &name[idx + 1..];
            if suffix.len() != 1 || !suffix.as_bytes()[0].is_ascii_digit() {
                return Err(NameAnnotationError::MalformedUnrolledSuffix(
                    name.to_owned(),
                ));
            }
            let digit = suffix.as_bytes()[0] - b'0';
            Ok(ParsedName {
                name: name[..idx].to_owned(),
                already_unrolled_count: digit as u32,
            })
        }
    }
}
