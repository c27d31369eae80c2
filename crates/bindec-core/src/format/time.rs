//! strftime-style timestamp patterns.

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, FixedOffset, Local, Utc};
use std::fmt::Write;

use crate::error::{Error, Result};

/// A validated timestamp pattern such as `%Y-%m-%d %H:%M:%S.%f`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeFormat {
    source: String,
    pattern: String,
}

impl TimeFormat {
    /// Parses `source`; `%f` is taken to mean six-digit microseconds
    pub fn parse(source: &str) -> Result<Self> {
        let pattern = translate(source);
        if StrftimeItems::new(&pattern).any(|item| matches!(item, Item::Error)) {
            return Err(Error::evaluation(format!(
                "invalid time format \"{}\"",
                source
            )));
        }
        Ok(Self {
            source: source.to_string(),
            pattern,
        })
    }

    /// Pattern as written in the schema
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Renders an instant given as seconds plus microseconds since the epoch.
    ///
    /// `tzoffs` is an offset east of UTC in seconds; `None` uses the local
    /// time zone.
    pub fn render(&self, secs: i64, micros: u32, tzoffs: Option<i32>) -> Result<String> {
        let utc = DateTime::<Utc>::from_timestamp(secs, micros.saturating_mul(1000))
            .ok_or_else(|| Error::evaluation(format!("timestamp {} is out of range", secs)))?;

        let mut out = String::new();
        let written = match tzoffs {
            Some(offset) => {
                let zone = FixedOffset::east_opt(offset).ok_or_else(|| {
                    Error::evaluation(format!("invalid time zone offset {}", offset))
                })?;
                write!(out, "{}", utc.with_timezone(&zone).format(&self.pattern))
            }
            None => write!(out, "{}", utc.with_timezone(&Local).format(&self.pattern)),
        };
        written.map_err(|_| {
            Error::evaluation(format!("cannot render timestamp with \"{}\"", self.source))
        })?;
        Ok(out)
    }
}

fn translate(source: &str) -> String {
    let mut out = String::with_capacity(source.len() + 4);
    let mut chars = source.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('f') => out.push_str("%6f"),
            Some(next) => {
                out.push('%');
                out.push(next);
            }
            None => out.push('%'),
        }
    }
    out
}

/// Splits a fixed-point timestamp into whole seconds and microseconds
pub fn split_scaled(value: u128, multiplier: u64) -> Option<(i64, u32)> {
    let m = u128::from(multiplier.max(1));
    let secs = i64::try_from(value / m).ok()?;
    let micros = (value % m) * 1_000_000 / m;
    Some((secs, micros as u32))
}

/// Splits a floating-point timestamp into whole seconds and microseconds
pub fn split_float(value: f64) -> Option<(i64, u32)> {
    if !value.is_finite() {
        return None;
    }
    let secs = value.floor();
    if secs < i64::MIN as f64 || secs > i64::MAX as f64 {
        return None;
    }
    let micros = ((value - secs) * 1_000_000.0).round() as u32;
    if micros >= 1_000_000 {
        Some((secs as i64 + 1, 0))
    } else {
        Some((secs as i64, micros))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_render_fixed_offset() {
        let fmt = TimeFormat::parse("%Y-%m-%d %H:%M:%S.%f").unwrap();
        let (secs, micros) = split_scaled(1_670_711_788_123, 1000).unwrap();
        assert_eq!(
            fmt.render(secs, micros, Some(0)).unwrap(),
            "2022-12-10 22:36:28.123000"
        );
        assert_eq!(
            fmt.render(secs, micros, Some(3600)).unwrap(),
            "2022-12-10 23:36:28.123000"
        );
    }

    #[test]
    fn test_split_float() {
        assert_eq!(split_float(1.5), Some((1, 500_000)));
        assert_eq!(split_float(-0.25), Some((-1, 750_000)));
        assert_eq!(split_float(f64::NAN), None);
    }

    #[test]
    fn test_split_scaled() {
        assert_eq!(split_scaled(1, 1), Some((1, 0)));
        assert_eq!(split_scaled(1500, 1000), Some((1, 500_000)));
        assert_eq!(split_scaled(u128::MAX, 1), None);
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(TimeFormat::parse("%Y-%Q").is_err());
        assert_eq!(TimeFormat::parse("%%f").unwrap().pattern, "%%f");
    }
}
