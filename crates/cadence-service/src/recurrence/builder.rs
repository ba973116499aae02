//! Builds the set of occurrences of one event inside a time range.

use std::collections::BTreeMap;
use std::collections::btree_map;
use std::ops::Bound;

use cadence_rfc::ical::core::{Component, Value, names};
use cadence_rfc::tz::{
    Moment, Span, TimeZoneTranslator, Tz, after, before, equal, normalize_utc_to_local_date,
    normalize_utc_to_local_wallclock, pin, to_utc,
};
use chrono::TimeDelta;

use super::instance::Instance;
use super::key::RecurrenceKey;
use super::rule::expand_rule;
use crate::error::ServiceResult;

const DEFAULT_MAX_ITERATIONS: usize = 100_000;

/// Occurrences of a master component and its overrides, keyed by
/// recurrence id in chronological order.
#[derive(Debug, Clone)]
pub struct InstanceList<'a> {
    translator: TimeZoneTranslator<'a>,
    utc: bool,
    timezone: Option<Tz>,
    max_iterations: usize,
    instances: BTreeMap<RecurrenceKey, Instance>,
}

/// Start, end and length of a component's own occurrence.
struct Bounds {
    start: Moment,
    end: Moment,
    duration: Span,
}

impl<'a> InstanceList<'a> {
    #[must_use]
    pub fn new(translator: TimeZoneTranslator<'a>) -> Self {
        Self {
            translator,
            utc: false,
            timezone: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            instances: BTreeMap::new(),
        }
    }

    /// Zone used to interpret floating and all-day values.
    #[must_use]
    pub fn with_timezone(mut self, timezone: Option<Tz>) -> Self {
        self.timezone = timezone;
        self
    }

    /// Converts every start and end to UTC before comparing.
    #[must_use]
    pub fn with_utc(mut self, utc: bool) -> Self {
        self.utc = utc;
        self
    }

    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    #[must_use]
    pub fn timezone(&self) -> Option<Tz> {
        self.timezone
    }

    #[must_use]
    pub fn is_utc(&self) -> bool {
        self.utc
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    #[must_use]
    pub fn get(&self, key: &RecurrenceKey) -> Option<&Instance> {
        self.instances.get(key)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, RecurrenceKey, Instance> {
        self.instances.iter()
    }

    pub fn values(&self) -> btree_map::Values<'_, RecurrenceKey, Instance> {
        self.instances.values()
    }

    pub fn keys(&self) -> btree_map::Keys<'_, RecurrenceKey, Instance> {
        self.instances.keys()
    }

    /// ## Summary
    /// Adds a master or an override depending on whether it has a
    /// RECURRENCE-ID.
    ///
    /// ## Errors
    /// Fails when a date property names an unknown timezone or a rule
    /// cannot be expanded.
    pub fn add_component(
        &mut self,
        component: &Component,
        range_start: &Moment,
        range_end: &Moment,
    ) -> ServiceResult<()> {
        if component.is_override() {
            self.add_override(component, range_start, range_end)?;
        } else {
            self.add_master(component, range_start, range_end)?;
        }
        Ok(())
    }

    /// ## Summary
    /// Adds every occurrence of a master that overlaps the range.
    ///
    /// The master's own occurrence and RDATEs are kept when they overlap
    /// `[range_start, range_end)`; an end touching `range_start` counts.
    /// RRULE occurrences are kept when they start before the adjusted range
    /// end, so a rule occurrence ending exactly at `range_start` is not
    /// filtered out. EXDATE and EXRULE entries are removed last.
    ///
    /// ## Errors
    /// Fails when a date property names an unknown timezone or a rule
    /// cannot be expanded.
    #[tracing::instrument(skip(self, component), fields(uid = component.uid()))]
    pub fn add_master(
        &mut self,
        component: &Component,
        range_start: &Moment,
        range_end: &Moment,
    ) -> ServiceResult<()> {
        let Some(Bounds {
            start,
            end,
            duration,
        }) = self.bounds(component)?
        else {
            tracing::debug!("Master has no DTSTART, no instances");
            return Ok(());
        };

        if self.before(&start, range_end)
            && (self.after(&end, range_start) || self.equal(&end, range_start))
        {
            self.insert(Instance::new(start, end));
        }

        for rdate in component.get_properties(names::RDATE) {
            if matches!(rdate.value, Value::PeriodList(_)) {
                for (period_start, period_end) in
                    Moment::periods_from_property(rdate, &self.translator)?
                {
                    let period_start = self.adjust_floating(period_start);
                    let period_end = self.adjust_floating(period_end);
                    if self.before(&period_start, range_end) && self.after(&period_end, range_start)
                    {
                        self.insert(Instance::new(period_start, period_end));
                    }
                }
            } else {
                for date in Moment::all_from_property(rdate, &self.translator)? {
                    let date = self.adjust_floating(self.convert_to_utc(date));
                    let date_end = date.add(duration)?;
                    if self.before(&date, range_end) && self.after(&date_end, range_start) {
                        self.insert(Instance::new(date, date_end));
                    }
                }
            }
        }

        let rrules: Vec<_> = component
            .get_properties(names::RRULE)
            .filter_map(|p| p.as_recur())
            .collect();
        let exrules: Vec<_> = component
            .get_properties(names::EXRULE)
            .filter_map(|p| p.as_recur())
            .collect();

        let adjusted = if rrules.is_empty() && exrules.is_empty() {
            None
        } else {
            Some((
                self.adjust_start_range(range_start, &start, duration)?,
                self.adjust_end_range(range_end, &start),
            ))
        };

        if let Some((adjusted_start, adjusted_end)) = &adjusted {
            for recur in &rrules {
                let expansion = expand_rule(
                    recur,
                    &start,
                    adjusted_start,
                    adjusted_end,
                    self.timezone,
                    self.max_iterations,
                )?;
                for occurrence in expansion.starts {
                    let instance = Instance::new(occurrence, occurrence.add(duration)?);
                    if !self.before(&instance.start, adjusted_end) {
                        continue;
                    }
                    if !self.after(&instance.end, range_start) {
                        tracing::debug!(
                            start = %instance.start,
                            "Keeping rule occurrence that ends at or before the range start"
                        );
                    }
                    self.insert(instance);
                }
            }
        }

        for exdate in component.get_properties(names::EXDATE) {
            for date in Moment::all_from_property(exdate, &self.translator)? {
                let date = self.adjust_floating(self.convert_to_utc(date));
                if self.instances.remove(&RecurrenceKey::from_moment(&date)).is_some() {
                    tracing::trace!(exdate = %date, "Removed excluded occurrence");
                }
            }
        }

        if let Some((adjusted_start, adjusted_end)) = &adjusted {
            for recur in &exrules {
                let expansion = expand_rule(
                    recur,
                    &start,
                    adjusted_start,
                    adjusted_end,
                    self.timezone,
                    self.max_iterations,
                )?;
                for occurrence in expansion.starts {
                    self.instances.remove(&RecurrenceKey::from_moment(&occurrence));
                }
            }
        }

        tracing::debug!(instances = self.instances.len(), "Expanded master");
        Ok(())
    }

    /// ## Summary
    /// Applies an override component. Returns whether the list changed.
    ///
    /// The occurrence it replaces is removed even when the override itself
    /// falls outside the range. With `RANGE=THISANDFUTURE` every later
    /// occurrence that is not itself overridden is shifted by the same
    /// offset and given the override's duration.
    ///
    /// ## Errors
    /// Fails when a date property names an unknown timezone.
    #[tracing::instrument(skip(self, component), fields(uid = component.uid()))]
    pub fn add_override(
        &mut self,
        component: &Component,
        range_start: &Moment,
        range_end: &Moment,
    ) -> ServiceResult<bool> {
        let Some(rid_property) = component.recurrence_id() else {
            return Ok(false);
        };
        let Some(Bounds { start, end, .. }) = self.bounds(component)? else {
            return Ok(false);
        };

        let mut recurrence_id = self.convert_to_utc(Moment::from_property(rid_property, &self.translator)?);
        if !recurrence_id.is_date() {
            recurrence_id = self.adjust_floating(recurrence_id);
        }

        let range = rid_property.get_param_value(names::RANGE);
        let future = range.is_some_and(|r| r.eq_ignore_ascii_case("THISANDFUTURE"));
        if range.is_some_and(|r| r.eq_ignore_ascii_case("THISANDPRIOR")) {
            tracing::warn!(recurrence_id = %recurrence_id, "RANGE=THISANDPRIOR is not supported, treating as a single override");
        }

        let instance = Instance {
            recurrence_id,
            start,
            end,
            overridden: true,
            future,
        };
        let key = instance.key();

        let mut modified = self.instances.remove(&key).is_some();

        if self.before(&start, range_end) && self.after(&end, range_start) {
            self.instances.insert(key.clone(), instance);
            modified = true;
        }

        if future {
            modified |= self.cascade(&key, &recurrence_id, &start, &end)?;
        }

        Ok(modified)
    }

    /// Shifts every later, non-overridden occurrence after a THISANDFUTURE
    /// override. Local and floating series move by wall-clock time.
    fn cascade(
        &mut self,
        key: &RecurrenceKey,
        recurrence_id: &Moment,
        start: &Moment,
        end: &Moment,
    ) -> ServiceResult<bool> {
        let shift = (!self.equal(start, recurrence_id)).then(|| {
            (
                wall_clock_offset(recurrence_id, start, self.timezone),
                Span::between(start, end, self.timezone),
            )
        });

        let mut shifted = Vec::new();
        for (later_key, old) in self
            .instances
            .range((Bound::Excluded(key), Bound::Unbounded))
            .filter(|(_, instance)| !instance.overridden)
        {
            let (new_start, new_end) = match shift {
                Some(((days, rest), duration)) => {
                    let new_start = old.recurrence_id.add(days)?.add(rest)?;
                    (new_start, new_start.add(duration)?)
                }
                None => (old.start, old.end),
            };
            tracing::trace!(recurrence_id = %old.recurrence_id, start = %new_start, "Shifted by THISANDFUTURE");
            shifted.push((
                later_key.clone(),
                Instance {
                    recurrence_id: old.recurrence_id,
                    start: new_start,
                    end: new_end,
                    overridden: false,
                    future: true,
                },
            ));
        }

        let modified = !shifted.is_empty();
        self.instances.extend(shifted);
        Ok(modified)
    }

    fn insert(&mut self, instance: Instance) {
        self.instances.insert(instance.key(), instance);
    }

    /// Resolves DTSTART and the end (DTEND, DTSTART + DURATION, or the
    /// default length), normalized for comparison.
    fn bounds(&self, component: &Component) -> ServiceResult<Option<Bounds>> {
        let Some(start_property) = component.get_property(names::DTSTART) else {
            return Ok(None);
        };
        let raw_start = Moment::from_property(start_property, &self.translator)?;
        let timed = !raw_start.is_date();

        let mut start = self.convert_to_utc(raw_start);
        if !start.is_date() {
            start = self.adjust_floating(start);
        }

        let default_length = if timed { Span::zero() } else { Span::Days(1) };

        let raw_end = match component.get_property(names::DTEND) {
            Some(end_property) => Some(Moment::from_property(end_property, &self.translator)?),
            None => component
                .get_property(names::DURATION)
                .and_then(|p| p.as_duration())
                .map(|duration| raw_start.add(Span::from_duration(duration)))
                .transpose()?,
        };

        let end = match raw_end {
            None => start.add(default_length)?,
            Some(raw_end) => {
                let mut end = self.convert_to_utc(raw_end);
                if timed {
                    end = self.adjust_floating(end);
                }
                if self.before(&end, &start) {
                    start.add(default_length)?
                } else {
                    end
                }
            }
        };

        let duration = Span::between(&start, &end, self.timezone);
        Ok(Some(Bounds {
            start,
            end,
            duration,
        }))
    }

    /// ## Summary
    /// Widens the range start by one occurrence length so occurrences that
    /// began earlier but are still running are found.
    ///
    /// All-day masters compare against the local date of the range start
    /// when a timezone is set.
    fn adjust_start_range(
        &self,
        range_start: &Moment,
        start: &Moment,
        duration: Span,
    ) -> ServiceResult<Moment> {
        if let (true, Some(zone)) = (start.is_date(), self.timezone) {
            return Ok(normalize_utc_to_local_date(
                to_utc(range_start, Some(zone)),
                Some(zone),
            ));
        }

        if !self.after(range_start, start) {
            return Ok(*range_start);
        }

        let widened = range_start.add(duration.negate())?;
        Ok(if self.before(&widened, range_start) {
            widened
        } else {
            *range_start
        })
    }

    /// All-day masters compare against the local wall clock of the range
    /// end when a timezone is set.
    fn adjust_end_range(&self, range_end: &Moment, start: &Moment) -> Moment {
        match self.timezone {
            Some(zone) if start.is_date() => {
                normalize_utc_to_local_wallclock(to_utc(range_end, Some(zone)), Some(zone))
            }
            _ => *range_end,
        }
    }

    fn convert_to_utc(&self, moment: Moment) -> Moment {
        if self.utc {
            Moment::Utc(to_utc(&moment, self.timezone))
        } else {
            moment
        }
    }

    /// Pins floating date-times to the configured timezone.
    fn adjust_floating(&self, moment: Moment) -> Moment {
        match (self.timezone, moment) {
            (Some(zone), Moment::Floating(_)) => pin(&moment, zone),
            _ => moment,
        }
    }

    fn before(&self, a: &Moment, b: &Moment) -> bool {
        before(a, b, self.timezone)
    }

    fn after(&self, a: &Moment, b: &Moment) -> bool {
        after(a, b, self.timezone)
    }

    fn equal(&self, a: &Moment, b: &Moment) -> bool {
        equal(a, b, self.timezone)
    }
}

/// Offset taking `from` to `to`, as whole days plus an exact remainder.
///
/// Two values on the same wall clock (one zone, or both floating) are
/// measured by that clock, so a shift across a DST change keeps the
/// local time of day.
fn wall_clock_offset(from: &Moment, to: &Moment, zone: Option<Tz>) -> (Span, Span) {
    let wall = match (from, to) {
        (Moment::Zoned(a), Moment::Zoned(b)) if a.timezone() == b.timezone() => {
            Some(b.naive_local() - a.naive_local())
        }
        (Moment::Floating(a), Moment::Floating(b)) => Some(*b - *a),
        _ => None,
    };
    match wall {
        Some(delta) => {
            let days = delta.num_days();
            (Span::Days(days), Span::Exact(delta - TimeDelta::days(days)))
        }
        None => (Span::zero(), Span::between(from, to, zone)),
    }
}

impl<'l, 'a> IntoIterator for &'l InstanceList<'a> {
    type Item = (&'l RecurrenceKey, &'l Instance);
    type IntoIter = btree_map::Iter<'l, RecurrenceKey, Instance>;

    fn into_iter(self) -> Self::IntoIter {
        self.instances.iter()
    }
}
