use std::fmt;
use std::fmt::Formatter;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DurationError {
    #[error("empty duration string")]
    Empty,
    #[error("invalid duration `{0}`")]
    Invalid(String),
    #[error("unknown unit `{unit}` in duration `{input}`")]
    UnknownUnit { input: String, unit: String },
    #[error("duration `{0}` overflows")]
    Overflow(String),
}

const MS_PER_SECOND: i64 = 1_000;
const MS_PER_MINUTE: i64 = 60 * MS_PER_SECOND;
const MS_PER_HOUR: i64 = 60 * MS_PER_MINUTE;
const MS_PER_DAY: i64 = 24 * MS_PER_HOUR;
const MS_PER_WEEK: i64 = 7 * MS_PER_DAY;
const MS_PER_YEAR: i64 = 365 * MS_PER_DAY;

/// Units ordered from largest to smallest. Compound durations must list units in this order.
const UNITS: [(&str, i64); 7] = [
    ("y", MS_PER_YEAR),
    ("w", MS_PER_WEEK),
    ("d", MS_PER_DAY),
    ("h", MS_PER_HOUR),
    ("m", MS_PER_MINUTE),
    ("s", MS_PER_SECOND),
    ("ms", 1),
];

fn unit_index(unit: &str) -> Option<usize> {
    UNITS.iter().position(|(name, _)| *name == unit)
}

/// Parses a Prometheus duration such as `5m`, `1h30m` or `250ms` into milliseconds.
pub fn parse_duration(s: &str) -> Result<i64, DurationError> {
    if s.is_empty() {
        return Err(DurationError::Empty);
    }
    let bytes = s.as_bytes();
    let mut pos = 0;
    let mut total: i64 = 0;
    let mut last_unit: Option<usize> = None;

    while pos < bytes.len() {
        let start = pos;
        while pos < bytes.len() && bytes[pos].is_ascii_digit() {
            pos += 1;
        }
        if start == pos {
            return Err(DurationError::Invalid(s.to_string()));
        }
        let n: i64 = s[start..pos]
            .parse()
            .map_err(|_| DurationError::Overflow(s.to_string()))?;

        let unit_start = pos;
        while pos < bytes.len() && bytes[pos].is_ascii_alphabetic() {
            pos += 1;
        }
        let unit = &s[unit_start..pos];
        if unit.is_empty() {
            return Err(DurationError::Invalid(s.to_string()));
        }
        let index = unit_index(unit).ok_or_else(|| DurationError::UnknownUnit {
            input: s.to_string(),
            unit: unit.to_string(),
        })?;
        if let Some(last) = last_unit {
            if index <= last {
                return Err(DurationError::Invalid(s.to_string()));
            }
        }
        last_unit = Some(index);

        let ms = n
            .checked_mul(UNITS[index].1)
            .and_then(|v| total.checked_add(v))
            .ok_or_else(|| DurationError::Overflow(s.to_string()))?;
        total = ms;
    }

    Ok(total)
}

const NAMES: [&str; 5] = ["y", "d", "h", "m", "s"];
const SIZES_MS: [i64; 5] = [MS_PER_YEAR, MS_PER_DAY, MS_PER_HOUR, MS_PER_MINUTE, MS_PER_SECOND];

/// Writes a millisecond duration in the compact form accepted by [`parse_duration`].
pub fn fmt_duration_ms(f: &mut Formatter<'_>, v: i64) -> fmt::Result {
    if v == 0 {
        return write!(f, "0s");
    }
    if v < 0 {
        write!(f, "-")?;
    }
    let v = v.abs();
    for i in 0..NAMES.len() {
        let whole = if i == 0 {
            v / SIZES_MS[i]
        } else {
            (v % SIZES_MS[i - 1]) / SIZES_MS[i]
        };
        if whole >= 1 {
            write!(f, "{}{}", whole, NAMES[i])?;
        }
    }
    if v % MS_PER_SECOND != 0 {
        write!(f, "{}ms", v % MS_PER_SECOND)?;
    }
    Ok(())
}

/// Display adapter for millisecond durations.
pub struct DurationMs(pub i64);

impl fmt::Display for DurationMs {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        fmt_duration_ms(f, self.0)
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case("5m", 300_000)]
    #[test_case("1h30m", 5_400_000)]
    #[test_case("250ms", 250)]
    #[test_case("1w", 604_800_000)]
    #[test_case("1y2d", 31_708_800_000)]
    #[test_case("0s", 0)]
    fn parses_valid_durations(input: &str, expected: i64) {
        assert_eq!(parse_duration(input), Ok(expected));
    }

    #[test_case(""; "empty")]
    #[test_case("5"; "missing unit")]
    #[test_case("m"; "missing number")]
    #[test_case("5x"; "unknown unit")]
    #[test_case("30m1h"; "out of order")]
    #[test_case("1.5h"; "fractional")]
    fn rejects_invalid_durations(input: &str) {
        assert!(parse_duration(input).is_err());
    }

    #[test_case(300_000, "5m")]
    #[test_case(5_400_000, "1h30m")]
    #[test_case(1_500, "1s500ms")]
    fn formats_durations(ms: i64, expected: &str) {
        assert_eq!(DurationMs(ms).to_string(), expected);
    }
}
