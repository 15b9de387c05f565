//! Resolved configuration, threaded explicitly through the parser and
//! emitter instead of living in globals.

use std::collections::HashSet;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("prefix '{0}' must not contain an underscore")]
    PrefixContainsUnderscore(String),
}

/// Above this, a task without `length × cycles_per_tick < threshold` is
/// considered a candidate for de-inlining (if inline) or inlining (if not).
/// Heuristics, not contracts — see spec.md §9's Open Questions.
pub const DEFAULT_DEINLINE_CYCLES: f64 = 200.0;
pub const DEFAULT_INLINE_CYCLES: f64 = 40.0;

#[derive(Debug, Clone)]
pub struct Config {
    pub max_ticks: u32,
    pub prefix: String,
    pub cycles_per_tick: f64,
    pub includes: Vec<String>,
    pub conditionals: HashSet<String>,
    pub output_path: Option<PathBuf>,
    pub input_files: Vec<PathBuf>,
    pub deinline_cycles_threshold: f64,
    pub inline_cycles_threshold: f64,
}

impl Config {
    pub fn new(
        max_ticks: u32,
        prefix: String,
        includes: Vec<String>,
        conditionals: Vec<String>,
        output_path: Option<PathBuf>,
        input_files: Vec<PathBuf>,
    ) -> Result<Self, ConfigError> {
        if prefix.contains('_') {
            return Err(ConfigError::PrefixContainsUnderscore(prefix));
        }

        Ok(Self {
            max_ticks,
            prefix,
            cycles_per_tick: 1952.0,
            includes,
            conditionals: conditionals.into_iter().collect(),
            output_path,
            input_files,
            deinline_cycles_threshold: DEFAULT_DEINLINE_CYCLES,
            inline_cycles_threshold: DEFAULT_INLINE_CYCLES,
        })
    }
}
