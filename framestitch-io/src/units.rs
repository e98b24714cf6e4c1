//! Time units found in `units` attributes.

use std::fmt;
use std::str::FromStr;

/// Unit of a stored time-of-flight dataset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TimeUnit {
    /// Nanoseconds, the NeXus default for `event_time_offset`.
    #[default]
    Nanoseconds,
    /// Microseconds, the unit used by the stitching engine.
    Microseconds,
    /// Milliseconds.
    Milliseconds,
    /// Seconds.
    Seconds,
}

impl TimeUnit {
    /// Canonical symbol written to `units` attributes.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Nanoseconds => "ns",
            Self::Microseconds => "us",
            Self::Milliseconds => "ms",
            Self::Seconds => "s",
        }
    }

    /// Number of this unit in one microsecond.
    #[must_use]
    pub fn per_microsecond(self) -> f64 {
        match self {
            Self::Nanoseconds => 1.0e3,
            Self::Microseconds => 1.0,
            Self::Milliseconds => 1.0e-3,
            Self::Seconds => 1.0e-6,
        }
    }

    /// Convert a stored value to microseconds.
    #[inline]
    #[must_use]
    pub fn to_microseconds(self, value: f64) -> f64 {
        match self {
            Self::Microseconds => value,
            _ => value / self.per_microsecond(),
        }
    }

    /// Convert microseconds back to this unit.
    #[inline]
    #[must_use]
    pub fn convert_microseconds(self, value: f64) -> f64 {
        match self {
            Self::Microseconds => value,
            _ => value * self.per_microsecond(),
        }
    }
}

impl FromStr for TimeUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ns" | "nanosecond" | "nanoseconds" => Ok(Self::Nanoseconds),
            "us" | "µs" | "μs" | "microsecond" | "microseconds" => Ok(Self::Microseconds),
            "ms" | "millisecond" | "milliseconds" => Ok(Self::Milliseconds),
            "s" | "second" | "seconds" => Ok(Self::Seconds),
            other => Err(format!("unsupported time unit '{other}'")),
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_parse_units() {
        assert_eq!("ns".parse::<TimeUnit>(), Ok(TimeUnit::Nanoseconds));
        assert_eq!(" Microseconds ".parse::<TimeUnit>(), Ok(TimeUnit::Microseconds));
        assert_eq!("µs".parse::<TimeUnit>(), Ok(TimeUnit::Microseconds));
        assert_eq!("s".parse::<TimeUnit>(), Ok(TimeUnit::Seconds));
        assert!("furlong".parse::<TimeUnit>().is_err());
    }

    #[test]
    fn test_nanosecond_conversion() {
        let unit = TimeUnit::Nanoseconds;
        assert_relative_eq!(unit.to_microseconds(55_000.0), 55.0);
        assert_relative_eq!(unit.convert_microseconds(1055.0), 1_055_000.0);
    }

    #[test]
    fn test_second_conversion() {
        let unit = TimeUnit::Seconds;
        assert_relative_eq!(unit.to_microseconds(0.071), 71_000.0, epsilon = 1e-6);
        assert_relative_eq!(unit.convert_microseconds(2_500.0), 0.0025, epsilon = 1e-12);
    }
}
