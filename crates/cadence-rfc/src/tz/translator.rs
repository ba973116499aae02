//! Maps arbitrary timezone identifiers to registry zones.

use chrono_tz::Tz;

use super::alias::TimeZoneAliasTable;
use super::registry::{ChronoTzRegistry, TimeZoneRegistry};
use crate::error::{RfcError, RfcResult};

static DEFAULT_REGISTRY: ChronoTzRegistry = ChronoTzRegistry;

/// Resolves timezone identifiers against a registry and an alias table.
///
/// Holds only shared references, so it is cheap to copy and safe to use
/// from any number of threads.
#[derive(Clone, Copy)]
pub struct TimeZoneTranslator<'a> {
    registry: &'a dyn TimeZoneRegistry,
    aliases: &'a TimeZoneAliasTable,
}

impl std::fmt::Debug for TimeZoneTranslator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeZoneTranslator")
            .field("aliases", &self.aliases.len())
            .finish_non_exhaustive()
    }
}

impl Default for TimeZoneTranslator<'static> {
    fn default() -> Self {
        Self::new(&DEFAULT_REGISTRY, TimeZoneAliasTable::shared())
    }
}

impl<'a> TimeZoneTranslator<'a> {
    #[must_use]
    pub fn new(registry: &'a dyn TimeZoneRegistry, aliases: &'a TimeZoneAliasTable) -> Self {
        Self { registry, aliases }
    }

    #[must_use]
    pub fn registry(&self) -> &'a dyn TimeZoneRegistry {
        self.registry
    }

    /// ## Summary
    /// Finds the zone an identifier denotes.
    ///
    /// Tries, in order: the registry, the alias table, then any known id
    /// that `id` ends with after a `/` (vendor-prefixed ids such as
    /// `/mozilla.org/20050126_1/America/New_York`). When several known ids
    /// match as a suffix, the longest wins.
    #[must_use]
    pub fn translate(&self, id: &str) -> Option<Tz> {
        let id = id.trim().trim_matches('"');
        if id.is_empty() {
            return None;
        }

        if let Some(tz) = self.registry.get(id) {
            return Some(tz);
        }

        if let Some(tz) = self
            .aliases
            .get(id)
            .and_then(|canonical| self.registry.get(canonical))
        {
            tracing::trace!(id, resolved = tz.name(), "Resolved timezone through alias");
            return Some(tz);
        }

        let suffix = self
            .registry
            .ids()
            .filter(|known| {
                id.strip_suffix(known)
                    .is_some_and(|prefix| prefix.is_empty() || prefix.ends_with('/'))
            })
            .max_by_key(|known| known.len())
            .and_then(|known| self.registry.get(known));
        if let Some(tz) = suffix {
            tracing::trace!(id, resolved = tz.name(), "Resolved timezone by suffix");
        } else {
            tracing::debug!(id, "Unable to resolve timezone");
        }
        suffix
    }

    /// Re-resolves a zone handle through the registry.
    #[must_use]
    pub fn translate_zone(&self, tz: Tz) -> Option<Tz> {
        self.translate(tz.name())
    }

    /// ## Summary
    /// Like [`Self::translate`] but fails when the identifier is unknown.
    ///
    /// ## Errors
    /// Returns `RfcError::UnknownTimeZone` when no strategy resolves `id`.
    pub fn resolve(&self, id: &str) -> RfcResult<Tz> {
        self.translate(id)
            .ok_or_else(|| RfcError::unknown_time_zone(id))
    }

    /// ## Summary
    /// Resolves `id` and insists that it is already spelled canonically.
    ///
    /// ## Errors
    /// Returns `RfcError::UnknownTimeZone` when `id` is unknown, with a
    /// correction hint when it resolves under a different spelling.
    pub fn resolve_exact(&self, id: &str) -> RfcResult<Tz> {
        let tz = self.resolve(id)?;
        if tz.name() == id {
            Ok(tz)
        } else {
            Err(RfcError::UnknownTimeZone {
                id: id.to_string(),
                hint: Some(tz.name().to_string()),
            })
        }
    }
}
