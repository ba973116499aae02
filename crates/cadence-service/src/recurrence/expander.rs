//! Calendar-level recurrence queries.

use cadence_core::config::RecurrenceConfig;
use cadence_rfc::ical::core::{Component, ComponentKind, ICalendar, Value, names};
use cadence_rfc::tz::{Moment, Span, TimeZoneTranslator, Tz, after, before, to_utc};
use chrono::{Months, TimeDelta};

use super::builder::InstanceList;
use super::rule::expand_bounded_rule;
use crate::error::{ServiceError, ServiceResult};

/// Earliest start and latest end of a series. `end` is `None` when the
/// series repeats forever.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrenceRange {
    pub start: Moment,
    pub end: Option<Moment>,
}

/// Expands recurring components using the configured limits.
#[derive(Debug, Clone)]
pub struct RecurrenceExpander<'a> {
    translator: TimeZoneTranslator<'a>,
    config: RecurrenceConfig,
}

impl Default for RecurrenceExpander<'static> {
    fn default() -> Self {
        Self::new(TimeZoneTranslator::default(), RecurrenceConfig::default())
    }
}

impl<'a> RecurrenceExpander<'a> {
    #[must_use]
    pub fn new(translator: TimeZoneTranslator<'a>, config: RecurrenceConfig) -> Self {
        Self { translator, config }
    }

    #[must_use]
    pub fn translator(&self) -> TimeZoneTranslator<'a> {
        self.translator
    }

    /// ## Summary
    /// Range covered by the calendar's master component and its overrides.
    ///
    /// Returns `Ok(None)` when the master has no DTSTART.
    ///
    /// ## Errors
    /// `ServiceError::NoMasterComponent` when the calendar only holds
    /// overrides, or a timezone/rule error from expansion.
    pub fn calculate_recurrence_range(
        &self,
        calendar: &ICalendar,
    ) -> ServiceResult<Option<RecurrenceRange>> {
        let (master, overrides) = master_and_overrides(calendar)?;
        self.calculate_component_range(master, &overrides)
    }

    /// ## Summary
    /// Range covered by `component`, widened by RDATEs, bounded RRULEs and
    /// the explicit start/end of each modification.
    ///
    /// EXDATE and EXRULE only shrink a series, so they are not consulted.
    /// Bounded rules are expanded to their last occurrence, capped only by
    /// the iteration limit.
    ///
    /// ## Errors
    /// Fails when a date property names an unknown timezone or a rule
    /// cannot be expanded.
    #[tracing::instrument(skip_all, fields(uid = component.uid()))]
    pub fn calculate_component_range(
        &self,
        component: &Component,
        modifications: &[&Component],
    ) -> ServiceResult<Option<RecurrenceRange>> {
        let Some(start_property) = component.get_property(names::DTSTART) else {
            return Ok(None);
        };
        let start = Moment::from_property(start_property, &self.translator)?;
        let default_length = if start.is_date() { Span::Days(1) } else { Span::zero() };

        let end = match self.end_of(component, &start)? {
            Some(end) if !before(&end, &start, None) => end,
            _ => start.add(default_length)?,
        };
        let duration = Span::between(&start, &end, None);

        let mut range_start = start;
        let mut range_end = Some(end);
        let widen = |range_start: &mut Moment, range_end: &mut Option<Moment>, s: Moment, e: Moment| {
            if before(&s, range_start, None) {
                *range_start = s;
            }
            if let Some(current) = range_end.as_mut() {
                if after(&e, current, None) {
                    *current = e;
                }
            }
        };

        for rdate in component.get_properties(names::RDATE) {
            if matches!(rdate.value, Value::PeriodList(_)) {
                for (s, e) in Moment::periods_from_property(rdate, &self.translator)? {
                    widen(&mut range_start, &mut range_end, s, e);
                }
            } else {
                for s in Moment::all_from_property(rdate, &self.translator)? {
                    let e = s.add(duration)?;
                    widen(&mut range_start, &mut range_end, s, e);
                }
            }
        }

        for recur in component
            .get_properties(names::RRULE)
            .filter_map(|p| p.as_recur())
        {
            if recur.is_unbounded() {
                tracing::debug!("Unbounded rule, range has no end");
                range_end = None;
                break;
            }
            let expansion = expand_bounded_rule(recur, &start, self.config.max_iterations)?;
            if let Some(last) = expansion.starts.last() {
                let last_end = last.add(duration)?;
                widen(&mut range_start, &mut range_end, *last, last_end);
            }
        }

        for modification in modifications {
            let Some(mod_start) = modification
                .get_property(names::DTSTART)
                .map(|p| Moment::from_property(p, &self.translator))
                .transpose()?
            else {
                continue;
            };
            let mod_end = self.end_of(modification, &mod_start)?;
            if before(&mod_start, &range_start, None) {
                range_start = mod_start;
            }
            if let (Some(current), Some(mod_end)) = (range_end.as_mut(), mod_end) {
                if after(&mod_end, current, None) {
                    *current = mod_end;
                }
            }
        }

        Ok(Some(RecurrenceRange {
            start: range_start,
            end: range_end,
        }))
    }

    /// ## Summary
    /// Default end of a query window opening at `from`, for callers with no
    /// range of their own.
    ///
    /// ## Errors
    /// `ServiceError::ValidationError` when the horizon runs past the
    /// representable range.
    pub fn horizon_end(&self, from: &Moment) -> ServiceResult<Moment> {
        to_utc(from, None)
            .checked_add_months(Months::new(self.config.horizon_months))
            .map(Moment::Utc)
            .ok_or_else(|| ServiceError::ValidationError(format!("no horizon after {from}")))
    }

    /// ## Summary
    /// Occurrences of the calendar's series overlapping
    /// `[range_start, range_end)`. Floating values are read in `timezone`.
    ///
    /// ## Errors
    /// `ServiceError::NoMasterComponent` when the calendar only holds
    /// overrides, or a timezone/rule error from expansion.
    #[tracing::instrument(skip(self, calendar))]
    pub fn get_occurrences(
        &self,
        calendar: &ICalendar,
        range_start: &Moment,
        range_end: &Moment,
        timezone: Option<Tz>,
    ) -> ServiceResult<InstanceList<'a>> {
        let (master, overrides) = master_and_overrides(calendar)?;
        self.get_component_occurrences(master, &overrides, range_start, range_end, timezone)
    }

    /// ## Summary
    /// Occurrences of `component` and its `modifications` overlapping
    /// `[range_start, range_end)`.
    ///
    /// ## Errors
    /// Fails when a date property names an unknown timezone or a rule
    /// cannot be expanded.
    pub fn get_component_occurrences(
        &self,
        component: &Component,
        modifications: &[&Component],
        range_start: &Moment,
        range_end: &Moment,
        timezone: Option<Tz>,
    ) -> ServiceResult<InstanceList<'a>> {
        let mut instances = InstanceList::new(self.translator)
            .with_timezone(timezone)
            .with_max_iterations(self.config.max_iterations);
        instances.add_master(component, range_start, range_end)?;
        for modification in modifications {
            instances.add_override(modification, range_start, range_end)?;
        }
        Ok(instances)
    }

    /// ## Summary
    /// Whether the series has an occurrence whose recurrence id is exactly
    /// `occurrence`.
    ///
    /// ## Errors
    /// `ServiceError::NoMasterComponent` when the calendar only holds
    /// overrides, or a timezone/rule error from expansion.
    pub fn is_occurrence(&self, calendar: &ICalendar, occurrence: &Moment) -> ServiceResult<bool> {
        let step = if occurrence.is_date() {
            Span::Days(1)
        } else {
            Span::Exact(TimeDelta::seconds(1))
        };
        let range_end = occurrence.add(step)?;
        let instances = self.get_occurrences(calendar, occurrence, &range_end, None)?;

        let wanted = to_utc(occurrence, None);
        Ok(instances
            .values()
            .any(|instance| to_utc(&instance.recurrence_id, None) == wanted))
    }

    /// Returns whether the component carries any recurrence property.
    #[must_use]
    pub fn is_recurring(component: &Component) -> bool {
        crate::component::is_recurring(component)
    }

    /// DTEND, or DTSTART plus DURATION.
    fn end_of(&self, component: &Component, start: &Moment) -> ServiceResult<Option<Moment>> {
        if let Some(end) = component.get_property(names::DTEND) {
            return Ok(Some(Moment::from_property(end, &self.translator)?));
        }
        Ok(component
            .get_property(names::DURATION)
            .and_then(|p| p.as_duration())
            .map(|duration| start.add(Span::from_duration(duration)))
            .transpose()?)
    }
}

/// ## Summary
/// Splits a calendar into its master and overrides.
///
/// The series kind is that of the first component that is not a
/// VTIMEZONE.
///
/// ## Errors
/// `ServiceError::NoMasterComponent` when there is no component without a
/// RECURRENCE-ID.
pub fn master_and_overrides(calendar: &ICalendar) -> ServiceResult<(&Component, Vec<&Component>)> {
    let kind = calendar
        .components()
        .iter()
        .map(|c| c.kind)
        .find(|kind| *kind != ComponentKind::Timezone)
        .ok_or_else(|| ServiceError::NoMasterComponent("calendar has no components".to_string()))?;

    let master = calendar.master(kind).ok_or_else(|| {
        ServiceError::NoMasterComponent(format!("calendar only has {kind} overrides"))
    })?;
    let overrides = calendar
        .root
        .children_of_kind(kind)
        .filter(|c| c.is_override())
        .collect();
    Ok((master, overrides))
}
