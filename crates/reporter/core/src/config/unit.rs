//! [`TimeUnit`] used for duration and rate conversion.

use std::time::Duration;

/// Granularity a reporter converts timer durations and rates to.
///
/// Parsing is ASCII case-insensitive and accepts the plural name, the singular name and the
/// usual short form (`ns`, `us`, `ms`, `s`, `m`, `h`, `d`).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    strum::EnumString,
    strum::Display,
    strum::EnumIter,
    strum::IntoStaticStr,
)]
#[strum(ascii_case_insensitive)]
pub enum TimeUnit {
    /// Nanoseconds.
    #[strum(to_string = "nanoseconds", serialize = "nanosecond", serialize = "ns")]
    Nanoseconds,
    /// Microseconds.
    #[strum(to_string = "microseconds", serialize = "microsecond", serialize = "us")]
    Microseconds,
    /// Milliseconds.
    #[strum(to_string = "milliseconds", serialize = "millisecond", serialize = "ms")]
    Milliseconds,
    /// Seconds.
    #[strum(to_string = "seconds", serialize = "second", serialize = "s")]
    Seconds,
    /// Minutes.
    #[strum(to_string = "minutes", serialize = "minute", serialize = "m")]
    Minutes,
    /// Hours.
    #[strum(to_string = "hours", serialize = "hour", serialize = "h")]
    Hours,
    /// Days.
    #[strum(to_string = "days", serialize = "day", serialize = "d")]
    Days,
}

impl TimeUnit {
    /// Number of nanoseconds in one unit.
    pub const fn nanos(self) -> u64 {
        match self {
            Self::Nanoseconds => 1,
            Self::Microseconds => 1_000,
            Self::Milliseconds => 1_000_000,
            Self::Seconds => 1_000_000_000,
            Self::Minutes => 60 * 1_000_000_000,
            Self::Hours => 60 * 60 * 1_000_000_000,
            Self::Days => 24 * 60 * 60 * 1_000_000_000,
        }
    }

    /// Converts a duration expressed in nanoseconds into this unit.
    pub fn convert_duration(self, nanos: f64) -> f64 {
        nanos / self.nanos() as f64
    }

    /// Converts an events-per-second rate into events per this unit.
    pub fn convert_rate(self, per_second: f64) -> f64 {
        per_second * (self.nanos() as f64 / 1_000_000_000.0)
    }

    /// Returns `amount` of this unit as a [`Duration`], saturating on overflow.
    pub const fn as_duration(self, amount: u64) -> Duration {
        Duration::from_nanos(amount.saturating_mul(self.nanos()))
    }

    /// Singular lowercase name, as used in rate labels (`events/second`).
    pub const fn singular(self) -> &'static str {
        match self {
            Self::Nanoseconds => "nanosecond",
            Self::Microseconds => "microsecond",
            Self::Milliseconds => "millisecond",
            Self::Seconds => "second",
            Self::Minutes => "minute",
            Self::Hours => "hour",
            Self::Days => "day",
        }
    }

    /// Label describing a rate in this unit, e.g. `events/second`.
    pub fn rate_label(self) -> String {
        format!("events/{}", self.singular())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[rstest]
    #[case("NANOSECONDS", TimeUnit::Nanoseconds)]
    #[case("microseconds", TimeUnit::Microseconds)]
    #[case("Milliseconds", TimeUnit::Milliseconds)]
    #[case("SECONDS", TimeUnit::Seconds)]
    #[case("seconds", TimeUnit::Seconds)]
    #[case("sEcOnDs", TimeUnit::Seconds)]
    #[case("Minutes", TimeUnit::Minutes)]
    #[case("HOURS", TimeUnit::Hours)]
    #[case("days", TimeUnit::Days)]
    #[case("second", TimeUnit::Seconds)]
    #[case("MS", TimeUnit::Milliseconds)]
    #[case("us", TimeUnit::Microseconds)]
    fn test_parse_recognised_names(#[case] raw: &str, #[case] expected: TimeUnit) {
        assert_eq!(TimeUnit::from_str(raw).unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("fortnights")]
    #[case("sec")]
    #[case("SECONDSS")]
    #[case("1s")]
    fn test_parse_unrecognised_names(#[case] raw: &str) {
        assert!(TimeUnit::from_str(raw).is_err());
    }

    #[test]
    fn test_display_parses_back() {
        for unit in TimeUnit::iter() {
            assert_eq!(TimeUnit::from_str(&unit.to_string()).unwrap(), unit);
            assert_eq!(TimeUnit::from_str(&unit.to_string().to_uppercase()).unwrap(), unit);
        }
    }

    #[test]
    fn test_conversions() {
        assert_eq!(TimeUnit::Seconds.convert_duration(1_500_000_000.0), 1.5);
        assert_eq!(TimeUnit::Milliseconds.convert_duration(2_000_000.0), 2.0);
        assert_eq!(TimeUnit::Minutes.convert_rate(2.0), 120.0);
        assert_eq!(TimeUnit::Seconds.convert_rate(2.0), 2.0);
        assert_eq!(TimeUnit::Seconds.as_duration(3), Duration::from_secs(3));
        assert_eq!(TimeUnit::Days.as_duration(u64::MAX), Duration::from_nanos(u64::MAX));
        assert_eq!(TimeUnit::Minutes.rate_label(), "events/minute");
    }
}
