//! RRULE/EXRULE expansion on top of the `rrule` crate.

use cadence_rfc::ical::core::{Recur, RecurUntil};
use cadence_rfc::tz::{Moment, localize, to_utc};
use chrono::{DateTime, NaiveDateTime, NaiveTime, TimeDelta, Utc};
use rrule::{RRule, RRuleSet, Tz, Unvalidated};

use crate::error::{ServiceError, ServiceResult};

/// Frame a rule is expanded in.
///
/// Zoned starts expand in their own zone so the wall-clock time survives DST
/// changes. UTC starts expand in UTC. Floating and all-day starts expand in
/// UTC too, standing in for "no zone", and are mapped back to their wall
/// clock afterwards.
#[derive(Debug, Clone, Copy)]
enum Frame {
    Zone(chrono_tz::Tz),
    Utc,
    Floating,
    Date,
}

impl Frame {
    fn of(start: &Moment) -> Self {
        match start {
            Moment::Zoned(dt) => Self::Zone(dt.timezone()),
            Moment::Utc(_) => Self::Utc,
            Moment::Floating(_) => Self::Floating,
            Moment::Date(_) => Self::Date,
        }
    }

    fn rrule_tz(self) -> Tz {
        match self {
            Self::Zone(tz) => Tz::Tz(tz),
            Self::Utc | Self::Floating | Self::Date => Tz::UTC,
        }
    }

    /// Places a wall-clock time in the frame.
    fn local(self, naive: NaiveDateTime) -> DateTime<Tz> {
        match self {
            Self::Zone(tz) => localize(tz, naive).with_timezone(&Tz::Tz(tz)),
            Self::Utc | Self::Floating | Self::Date => naive.and_utc().with_timezone(&Tz::UTC),
        }
    }

    /// Places a window bound in the frame. Floating frames compare wall
    /// clocks, so bounds are read through `zone` first.
    fn bound(self, moment: &Moment, zone: Option<chrono_tz::Tz>) -> DateTime<Tz> {
        match self {
            Self::Zone(_) | Self::Utc => to_utc(moment, zone).with_timezone(&self.rrule_tz()),
            Self::Floating | Self::Date => match (moment, zone) {
                (Moment::Utc(_) | Moment::Zoned(_), Some(zone)) => {
                    self.local(to_utc(moment, None).with_timezone(&zone).naive_local())
                }
                _ => self.local(to_utc(moment, None).naive_utc()),
            },
        }
    }

    fn to_moment(self, occurrence: &DateTime<Tz>) -> Moment {
        match self {
            Self::Zone(tz) => Moment::Zoned(occurrence.with_timezone(&tz)),
            Self::Utc => Moment::Utc(occurrence.with_timezone(&Utc)),
            Self::Floating => Moment::Floating(occurrence.naive_utc()),
            Self::Date => Moment::Date(occurrence.naive_utc().date()),
        }
    }
}

/// Starts produced by one rule inside a window.
#[derive(Debug, Clone, Default)]
pub struct RuleExpansion {
    pub starts: Vec<Moment>,
    /// The iteration cap was reached before the window was exhausted.
    pub limited: bool,
}

/// ## Summary
/// Expands `recur` seeded at `start`, keeping starts in
/// `[window_start, window_end)`.
///
/// Floating window bounds are read in `zone`. Starts come back in the same
/// form as `start`. An UNTIL earlier than `start` yields nothing.
///
/// ## Errors
/// Returns `ServiceError::Recurrence` when the rule cannot be built.
pub fn expand_rule(
    recur: &Recur,
    start: &Moment,
    window_start: &Moment,
    window_end: &Moment,
    zone: Option<chrono_tz::Tz>,
    max_iterations: usize,
) -> ServiceResult<RuleExpansion> {
    expand(recur, start, window_start, Some(window_end), zone, max_iterations)
}

/// ## Summary
/// Every start of a rule with a COUNT or UNTIL, from `start` on. Only the
/// iteration cap limits the expansion.
///
/// ## Errors
/// Returns `ServiceError::Recurrence` when the rule cannot be built.
pub fn expand_bounded_rule(
    recur: &Recur,
    start: &Moment,
    max_iterations: usize,
) -> ServiceResult<RuleExpansion> {
    expand(recur, start, start, None, None, max_iterations)
}

fn expand(
    recur: &Recur,
    start: &Moment,
    window_start: &Moment,
    window_end: Option<&Moment>,
    zone: Option<chrono_tz::Tz>,
    max_iterations: usize,
) -> ServiceResult<RuleExpansion> {
    let frame = Frame::of(start);
    let dt_start = frame.local(start.naive_local());

    let until = match &recur.until {
        Some(until) => {
            let until = normalize_until(until, start, frame);
            if until < dt_start {
                tracing::debug!(rule = %recur, "UNTIL precedes DTSTART, no occurrences");
                return Ok(RuleExpansion::default());
            }
            Some(until.with_timezone(&Utc).format("%Y%m%dT%H%M%SZ").to_string())
        }
        None => None,
    };

    let rule_text = recur.to_rule_text(until.as_deref());
    let rrule = rule_text
        .parse::<RRule<Unvalidated>>()
        .map_err(|err| ServiceError::Recurrence(format!("{rule_text}: {err}")))?;
    let rrule_set: RRuleSet = rrule
        .build(dt_start)
        .map_err(|err| ServiceError::Recurrence(format!("{rule_text}: {err}")))?;

    let lower = frame.bound(window_start, zone);
    let upper = window_end.map(|end| frame.bound(end, zone));
    if upper.is_some_and(|upper| upper <= lower) {
        return Ok(RuleExpansion::default());
    }

    // `after`/`before` are inclusive, the window end is not.
    let limit = u16::try_from(max_iterations).unwrap_or(u16::MAX);
    let rrule_set = rrule_set.after(lower - TimeDelta::seconds(1));
    let result = match upper {
        Some(upper) => rrule_set.before(upper).all(limit),
        None => rrule_set.all(limit),
    };

    if result.limited {
        tracing::warn!(rule = %rule_text, limit, "Recurrence expansion hit the iteration cap");
    }

    let starts: Vec<Moment> = result
        .dates
        .iter()
        .filter(|occurrence| {
            **occurrence >= lower && upper.is_none_or(|upper| **occurrence < upper)
        })
        .map(|occurrence| frame.to_moment(occurrence))
        .collect();
    tracing::trace!(rule = %rule_text, count = starts.len(), "Expanded recurrence rule");

    Ok(RuleExpansion {
        starts,
        limited: result.limited,
    })
}

/// UNTIL as an instant in the expansion frame.
///
/// A DATE bound on a timed series covers the whole day; UTC bounds on
/// floating series are read as wall clock.
fn normalize_until(until: &RecurUntil, start: &Moment, frame: Frame) -> DateTime<Tz> {
    match until {
        RecurUntil::Date(date) => {
            let time = if start.is_date() {
                NaiveTime::MIN
            } else {
                NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN)
            };
            frame.local(date.and_time(time))
        }
        RecurUntil::DateTime(dt) => match frame {
            Frame::Zone(_) | Frame::Utc if dt.is_utc() => {
                dt.local.and_utc().with_timezone(&frame.rrule_tz())
            }
            _ => frame.local(dt.local),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_rfc::ical::core::{DateTime as ICalDateTime, Frequency};
    use chrono::NaiveDate;
    use chrono_tz::America::Los_Angeles;

    fn naive(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .and_then(|date| date.and_hms_opt(h, 0, 0))
            .expect("valid test date")
    }

    fn daily(count: Option<u32>) -> Recur {
        let mut recur = Recur::new(Frequency::Daily);
        recur.count = count;
        recur
    }

    #[test_log::test]
    fn zoned_series_keeps_wall_clock_across_dst() {
        let start = Moment::Zoned(localize(Los_Angeles, naive(2024, 3, 8, 9)));
        let expansion = expand_rule(
            &daily(Some(4)),
            &start,
            &start,
            &Moment::Utc(naive(2024, 4, 1, 0).and_utc()),
            None,
            1000,
        )
        .expect("expands");
        let hours: Vec<_> = expansion
            .starts
            .iter()
            .map(|m| m.naive_local())
            .collect();
        assert_eq!(
            hours,
            vec![
                naive(2024, 3, 8, 9),
                naive(2024, 3, 9, 9),
                naive(2024, 3, 10, 9),
                naive(2024, 3, 11, 9)
            ]
        );
        assert!(expansion.starts.iter().all(|m| m.zone() == Some(Los_Angeles)));
    }

    #[test_log::test]
    fn window_is_half_open() {
        let start = Moment::Utc(naive(2024, 1, 1, 9).and_utc());
        let expansion = expand_rule(
            &daily(None),
            &start,
            &Moment::Utc(naive(2024, 1, 2, 9).and_utc()),
            &Moment::Utc(naive(2024, 1, 4, 9).and_utc()),
            None,
            1000,
        )
        .expect("expands");
        assert_eq!(
            expansion.starts,
            vec![
                Moment::Utc(naive(2024, 1, 2, 9).and_utc()),
                Moment::Utc(naive(2024, 1, 3, 9).and_utc())
            ]
        );
    }

    #[test_log::test]
    fn date_series_and_date_until() {
        let start = Moment::Date(NaiveDate::from_ymd_opt(2024, 1, 1).expect("date"));
        let mut recur = Recur::new(Frequency::Weekly);
        recur.until = Some(RecurUntil::Date(
            NaiveDate::from_ymd_opt(2024, 1, 15).expect("date"),
        ));
        let expansion = expand_rule(
            &recur,
            &start,
            &start,
            &Moment::Date(NaiveDate::from_ymd_opt(2025, 1, 1).expect("date")),
            None,
            1000,
        )
        .expect("expands");
        assert_eq!(expansion.starts.len(), 3);
        assert!(expansion.starts.iter().all(Moment::is_date));
    }

    #[test_log::test]
    fn until_before_start_is_empty() {
        let start = Moment::Zoned(localize(Los_Angeles, naive(2024, 1, 10, 9)));
        let mut recur = daily(None);
        recur.until = Some(RecurUntil::DateTime(ICalDateTime::utc(naive(2024, 1, 1, 0))));
        let expansion = expand_rule(
            &recur,
            &start,
            &start,
            &Moment::Utc(naive(2025, 1, 1, 0).and_utc()),
            None,
            1000,
        )
        .expect("expands");
        assert!(expansion.starts.is_empty());
    }

    #[test_log::test]
    fn floating_series_read_in_zone() {
        let start = Moment::Floating(naive(2024, 1, 1, 9));
        // 17:00Z on Jan 2 is 09:00 in Los Angeles.
        let expansion = expand_rule(
            &daily(Some(5)),
            &start,
            &Moment::Utc(naive(2024, 1, 2, 17).and_utc()),
            &Moment::Utc(naive(2024, 1, 3, 17).and_utc()),
            Some(Los_Angeles),
            1000,
        )
        .expect("expands");
        assert_eq!(expansion.starts, vec![Moment::Floating(naive(2024, 1, 2, 9))]);
    }
}
