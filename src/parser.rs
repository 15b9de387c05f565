//! Schedule-file line parser.

use std::collections::HashSet;
use std::io::BufRead;

use thiserror::Error;

use crate::schedule::{PlacementError, Schedule};
use crate::task::{strip_conditional, strip_unrolled_count, ConditionalOutcome, NameAnnotationError};
use crate::time::{parse_period, parse_time, TimeParseError};

#[derive(Error, Debug)]
pub enum ScheduleParseError {
    #[error("{file}:{line}: expected 3 whitespace-separated tokens (name period length)")]
    MissingTokens { file: String, line: usize },

    #[error("{file}:{line}: {source}")]
    Time {
        file: String,
        line: usize,
        #[source]
        source: TimeParseError,
    },

    #[error("{file}:{line}: {source}")]
    NameAnnotation {
        file: String,
        line: usize,
        #[source]
        source: NameAnnotationError,
    },

    #[error("{file}:{line}: {source}")]
    Placement {
        file: String,
        line: usize,
        #[source]
        source: PlacementError,
    },
}

/// Parse every live line of `reader` (named `file` for diagnostics) into
/// `schedule`, resolving `?cond` annotations against `conditionals`.
pub fn parse_schedule<R: BufRead>(
    reader: R,
    file: &str,
    conditionals: &HashSet<String>,
    cycles_per_tick: f64,
    schedule: &mut Schedule,
) -> Result<(), ScheduleParseError> {
    for (lineno, line) in reader.lines().enumerate() {
        let lineno = lineno + 1;
        let line = line.map_err(|_| ScheduleParseError::MissingTokens {
            file: file.to_owned(),
            line: lineno,
        })?;

        let mut tokens = line.split_whitespace();
        let Some(raw_name) = tokens.next() else {
            continue;
        };
        if raw_name.starts_with('#') {
            continue;
        }

        let period_tok = tokens.next().ok_or_else(|| ScheduleParseError::MissingTokens {
            file: file.to_owned(),
            line: lineno,
        })?;
        let length_tok = tokens.next().ok_or_else(|| ScheduleParseError::MissingTokens {
            file: file.to_owned(),
            line: lineno,
        })?;
        if tokens.next().is_some() {
            return Err(ScheduleParseError::MissingTokens {
                file: file.to_owned(),
                line: lineno,
            });
        }

        let name = match strip_conditional(raw_name, conditionals) {
            ConditionalOutcome::Keep(name) => name,
            ConditionalOutcome::Skip { conditional } => {
                log::warn!(
                    "{file}:{lineno}: skipping entry for '{raw_name}' (undefined conditional '{conditional}')"
                );
                continue;
            }
        };

        let parsed = strip_unrolled_count(&name).map_err(|source| ScheduleParseError::NameAnnotation {
            file: file.to_owned(),
            line: lineno,
            source,
        })?;

        let period = parse_period(period_tok, cycles_per_tick).map_err(|source| {
            ScheduleParseError::Time {
                file: file.to_owned(),
                line: lineno,
                source,
            }
        })?;
        let length = parse_time(length_tok, cycles_per_tick).map_err(|source| {
            ScheduleParseError::Time {
                file: file.to_owned(),
                line: lineno,
                source,
            }
        })?;

        schedule
            .insert_task(parsed.name, period, length, parsed.already_unrolled_count)
            .map_err(|source| ScheduleParseError::Placement {
                file: file.to_owned(),
                line: lineno,
                source,
            })?;
    }

    Ok(())
}
