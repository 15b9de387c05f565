//! Parsing of length/period tokens into fractional tick counts.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TimeParseError {
    #[error("invalid numeric value '{0}'")]
    InvalidNumber(String),
}

/// Parse a token of the form `<number>` (ticks) or `<number>c`/`<number>C`
/// (CPU cycles, divided by `cycles_per_tick`).
pub fn parse_time(token: &str, cycles_per_tick: f64) -> Result<f64, TimeParseError> {
    let (digits, is_cycles) = match token.chars().last() {
        Some('c') | Some('C') => (&token[..token.len() - 1], true),
        _ => (token, false),
    };

    let value: f64 = digits
        .parse()
        .map_err(|_| TimeParseError::InvalidNumber(token.to_owned()))?;

    if is_cycles {
        Ok(value / cycles_per_tick)
    } else {
        Ok(value)
    }
}

/// Parse a period token, rounding to the nearest integer tick count.
///
/// Power-of-two validation is the caller's responsibility (it needs the
/// task name for a useful diagnostic).
pub fn parse_period(token: &str, cycles_per_tick: f64) -> Result<u32, TimeParseError> {
    let ticks = parse_time(token, cycles_per_tick)?;
    Ok(ticks.round() as u32)
}
