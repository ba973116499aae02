//! Alternate timezone identifiers.

use std::collections::HashMap;
use std::sync::LazyLock;

/// Alias resource compiled into the binary.
const ALIAS_RESOURCE: &str = include_str!("timezone.alias");

static SHARED: LazyLock<TimeZoneAliasTable> = LazyLock::new(|| {
    let table = TimeZoneAliasTable::parse(ALIAS_RESOURCE);
    tracing::debug!(aliases = table.len(), "Loaded timezone alias table");
    table
});

/// Read-only map from alternate timezone ids to canonical ones.
///
/// The process-wide table is built once from the embedded resource; callers
/// pass it by reference to whatever needs it.
#[derive(Debug, Clone, Default)]
pub struct TimeZoneAliasTable {
    aliases: HashMap<String, String>,
}

impl TimeZoneAliasTable {
    /// The table built from the embedded alias resource.
    #[must_use]
    pub fn shared() -> &'static Self {
        &SHARED
    }

    /// ## Summary
    /// Parses `alias=canonical` lines. Blank lines and lines starting with
    /// `#` are skipped, as are lines without an `=`.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let aliases = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| {
                let Some((alias, canonical)) = line.split_once('=') else {
                    tracing::warn!(line, "Skipping malformed timezone alias");
                    return None;
                };
                Some((alias.trim().to_string(), canonical.trim().to_string()))
            })
            .collect();
        Self { aliases }
    }

    #[must_use]
    pub fn get(&self, alias: &str) -> Option<&str> {
        self.aliases.get(alias).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}
