//! iCalendar DURATION value type (RFC 5545 §3.3.6).

use std::fmt;

use chrono::TimeDelta;

/// Duration value (RFC 5545 §3.3.6).
///
/// Week and day parts are nominal, the time parts are exact. Year and
/// month designators do not exist in iCalendar durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Duration {
    pub negative: bool,
    pub weeks: u32,
    pub days: u32,
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
}

impl Duration {
    #[must_use]
    pub const fn zero() -> Self {
        Self {
            negative: false,
            weeks: 0,
            days: 0,
            hours: 0,
            minutes: 0,
            seconds: 0,
        }
    }

    #[must_use]
    pub const fn days(days: u32) -> Self {
        Self {
            days,
            ..Self::zero()
        }
    }

    /// Returns whether the duration only has week/day parts.
    #[must_use]
    pub const fn is_nominal(&self) -> bool {
        self.hours == 0 && self.minutes == 0 && self.seconds == 0
    }

    /// Signed number of whole days in the week/day parts.
    #[must_use]
    pub fn nominal_days(&self) -> i64 {
        let days = i64::from(self.weeks) * 7 + i64::from(self.days);
        if self.negative { -days } else { days }
    }

    /// Total signed length in seconds, counting days as 86 400 seconds.
    #[must_use]
    pub fn as_seconds(&self) -> i64 {
        let total = i64::from(self.weeks) * 604_800
            + i64::from(self.days) * 86_400
            + i64::from(self.hours) * 3_600
            + i64::from(self.minutes) * 60
            + i64::from(self.seconds);
        if self.negative { -total } else { total }
    }

    #[must_use]
    pub fn to_time_delta(&self) -> TimeDelta {
        TimeDelta::seconds(self.as_seconds())
    }

    /// Builds the shortest duration spelling for an exact span.
    #[must_use]
    pub fn from_time_delta(delta: TimeDelta) -> Self {
        let negative = delta < TimeDelta::zero();
        let total = delta.num_seconds().unsigned_abs();
        let whole_weeks = total % 604_800 == 0 && total > 0;
        let part = |value: u64| u32::try_from(value).unwrap_or(u32::MAX);

        if whole_weeks {
            return Self {
                negative,
                weeks: part(total / 604_800),
                ..Self::zero()
            };
        }

        Self {
            negative,
            weeks: 0,
            days: part(total / 86_400),
            hours: part((total % 86_400) / 3_600),
            minutes: part((total % 3_600) / 60),
            seconds: part(total % 60),
        }
    }

    #[must_use]
    pub const fn negate(self) -> Self {
        Self {
            negative: !self.negative,
            ..self
        }
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negative {
            f.write_str("-")?;
        }
        f.write_str("P")?;

        if self.weeks > 0 {
            return write!(f, "{}W", self.weeks);
        }

        if self.days > 0 {
            write!(f, "{}D", self.days)?;
        }

        if self.is_nominal() {
            if self.days == 0 {
                f.write_str("T0S")?;
            }
            return Ok(());
        }

        f.write_str("T")?;
        if self.hours > 0 {
            write!(f, "{}H", self.hours)?;
        }
        if self.minutes > 0 {
            write!(f, "{}M", self.minutes)?;
        }
        if self.seconds > 0 {
            write!(f, "{}S", self.seconds)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_spellings() {
        assert_eq!(Duration::zero().to_string(), "PT0S");
        assert_eq!(Duration::days(1).to_string(), "P1D");
        assert_eq!(
            Duration::from_time_delta(TimeDelta::minutes(90)).to_string(),
            "PT1H30M"
        );
        assert_eq!(
            Duration::from_time_delta(TimeDelta::days(14)).to_string(),
            "P2W"
        );
        assert_eq!(
            Duration::from_time_delta(TimeDelta::seconds(-(86_400 + 60))).to_string(),
            "-P1DT1M"
        );
    }

    #[test]
    fn seconds_and_days() {
        let duration = Duration {
            negative: true,
            weeks: 1,
            days: 2,
            hours: 3,
            ..Duration::zero()
        };
        assert_eq!(duration.nominal_days(), -9);
        assert_eq!(duration.as_seconds(), -(9 * 86_400 + 3 * 3_600));
    }
}
