use std::fmt;
use std::str::FromStr;

use cadence_rfc::tz::Moment;

use crate::error::{ServiceError, ServiceResult};
use crate::recurrence::RecurrenceKey;

/// Identity of a modification item: its master's UID and the recurrence
/// id of the occurrence it replaces, written `parent:KEY`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModificationUid {
    parent_uid: String,
    recurrence_id: RecurrenceKey,
}

impl ModificationUid {
    #[must_use]
    pub fn new(parent_uid: impl Into<String>, recurrence_id: &Moment) -> Self {
        Self {
            parent_uid: parent_uid.into(),
            recurrence_id: RecurrenceKey::from_moment(recurrence_id),
        }
    }

    #[must_use]
    pub fn from_key(parent_uid: impl Into<String>, recurrence_id: RecurrenceKey) -> Self {
        Self {
            parent_uid: parent_uid.into(),
            recurrence_id,
        }
    }

    /// ## Summary
    /// Splits `text` at its last `:`; parent UIDs may contain colons.
    ///
    /// ## Errors
    /// `ServiceError::ValidationError` when there is no separator or the
    /// recurrence id is malformed.
    pub fn parse(text: &str) -> ServiceResult<Self> {
        let (parent, key) = text.rsplit_once(':').ok_or_else(|| {
            ServiceError::ValidationError(format!("invalid modification uid: {text}"))
        })?;
        Ok(Self {
            parent_uid: parent.to_string(),
            recurrence_id: RecurrenceKey::parse(key)?,
        })
    }

    #[must_use]
    pub fn parent_uid(&self) -> &str {
        &self.parent_uid
    }

    #[must_use]
    pub fn recurrence_id(&self) -> &RecurrenceKey {
        &self.recurrence_id
    }
}

impl fmt::Display for ModificationUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.parent_uid, self.recurrence_id)
    }
}

impl FromStr for ModificationUid {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
