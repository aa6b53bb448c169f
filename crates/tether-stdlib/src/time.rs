//! Wall-clock time (std.Time)
//!
//! A `Time` wraps a UTC instant with nanosecond precision, projected as a
//! class so scripts hold it by handle.

use std::fmt;

use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use tether_engine::{Class, ClassSpec, Methods, Object};

/// Stable identity of the `Time` class
pub const TIME_UUID: &str = "4a8e2b6c-91d3-4f07-b5e2-7c1d0f3a9e58";

const NANOS_PER_SEC: f64 = 1_000_000_000.0;

/// Errors raised by time arithmetic
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TimeError {
    /// The result does not fit the representable range
    #[error("time {secs}s is out of range")]
    OutOfRange {
        /// Offending seconds value
        secs: f64,
    },
}

/// An instant in UTC
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Class)]
#[tether(methods = time_methods)]
pub struct Time {
    #[tether("-")]
    instant: DateTime<Utc>,
}

impl Time {
    /// The current time
    pub fn now() -> Self {
        Self { instant: Utc::now() }
    }

    /// Build from fractional seconds since the epoch
    pub fn from_unix(secs: f64) -> Result<Self, TimeError> {
        let out_of_range = TimeError::OutOfRange { secs };
        let whole = secs.floor();
        if !whole.is_finite() || whole < i64::MIN as f64 || whole >= i64::MAX as f64 {
            return Err(out_of_range);
        }
        let nanos = ((secs - whole) * NANOS_PER_SEC).round();
        // rounding may carry a full second
        let (whole, nanos) = if nanos >= NANOS_PER_SEC {
            (whole + 1.0, 0.0)
        } else {
            (whole, nanos)
        };
        DateTime::from_timestamp(whole as i64, nanos as u32)
            .map(Self::from)
            .ok_or(out_of_range)
    }

    /// The underlying instant
    pub fn datetime(&self) -> DateTime<Utc> {
        self.instant
    }

    /// Whole seconds since the epoch
    pub fn unix(&self) -> i64 {
        self.instant.timestamp()
    }

    /// Whole milliseconds since the epoch
    pub fn unix_millis(&self) -> i64 {
        self.instant.timestamp_millis()
    }

    /// Move by `secs`, which may be negative or fractional
    pub fn add_seconds(&mut self, secs: f64) -> Result<(), TimeError> {
        let nanos = (secs * NANOS_PER_SEC).round();
        if !nanos.is_finite() || nanos.abs() >= i64::MAX as f64 {
            return Err(TimeError::OutOfRange { secs });
        }
        self.instant = self
            .instant
            .checked_add_signed(TimeDelta::nanoseconds(nanos as i64))
            .ok_or(TimeError::OutOfRange { secs })?;
        Ok(())
    }

    /// Seconds elapsed from `earlier` to `self`
    pub fn since(&self, earlier: &Time) -> f64 {
        let delta = self.instant - earlier.instant;
        match delta.num_nanoseconds() {
            Some(nanos) => nanos as f64 / NANOS_PER_SEC,
            None => delta.num_milliseconds() as f64 / 1_000.0,
        }
    }

    /// RFC 3339 rendering in UTC, e.g. `2023-11-14T22:13:20.500Z`
    pub fn to_rfc3339(&self) -> String {
        self.instant.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }
}

impl From<DateTime<Utc>> for Time {
    fn from(instant: DateTime<Utc>) -> Self {
        Self { instant }
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_rfc3339())
    }
}

fn time_methods() -> Methods<Time> {
    Methods::new()
        .method("unix", Time::unix)
        .method("unix_millis", Time::unix_millis)
        .method_mut("add_seconds", Time::add_seconds)
        .method("since", |t: &Time, earlier: Object<Time>| -> Result<f64, String> {
            let earlier = earlier
                .try_borrow()
                .map_err(|_| "time is already borrowed".to_string())?;
            Ok(t.since(&earlier))
        })
        .method("string", Time::to_rfc3339)
}

/// Registration of the `Time` class with its statics
pub fn time_class() -> ClassSpec<Time> {
    ClassSpec::new(TIME_UUID, "Time")
        .static_fn("now", || Object::new(Time::now()))
        .static_fn("from_unix", |secs: f64| Time::from_unix(secs).map(Object::new))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: f64) -> Time {
        Time::from_unix(secs).unwrap()
    }

    #[test]
    fn test_rfc3339() {
        assert_eq!(at(0.0).to_rfc3339(), "1970-01-01T00:00:00Z");
        assert_eq!(at(1_700_000_000.0).to_rfc3339(), "2023-11-14T22:13:20Z");
        assert_eq!(at(951_782_400.0).to_rfc3339(), "2000-02-29T00:00:00Z");
        assert_eq!(at(-1.0).to_rfc3339(), "1969-12-31T23:59:59Z");
        assert_eq!(at(1.5).to_rfc3339(), "1970-01-01T00:00:01.500Z");
        assert_eq!(at(1.5).to_string(), at(1.5).to_rfc3339());
    }

    #[test]
    fn test_arithmetic() {
        let mut t = at(1.5);
        assert_eq!(t.unix(), 1);
        assert_eq!(t.unix_millis(), 1_500);
        let start = t;
        t.add_seconds(2.25).unwrap();
        assert_eq!(t.since(&start), 2.25);
        assert_eq!(start.since(&t), -2.25);
        assert!(t > start);
        assert_eq!(at(-0.25).unix(), -1);
        assert_eq!(at(-0.25).unix_millis(), -250);
    }

    #[test]
    fn test_out_of_range() {
        assert!(Time::from_unix(f64::NAN).is_err());
        assert!(Time::from_unix(f64::INFINITY).is_err());
        assert_eq!(
            Time::from_unix(1e20),
            Err(TimeError::OutOfRange { secs: 1e20 })
        );

        let mut t = at(0.0);
        assert!(t.add_seconds(1e300).is_err());
        assert!(t.add_seconds(f64::NAN).is_err());
        assert_eq!(t, at(0.0));
    }

    #[test]
    fn test_now_is_after_epoch() {
        assert!(Time::now().unix() > 1_600_000_000);
        let dt = Time::now().datetime();
        assert_eq!(Time::from(dt).datetime(), dt);
    }
}
