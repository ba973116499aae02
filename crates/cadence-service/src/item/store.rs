use std::collections::BTreeMap;

use super::model::Item;
use super::modification_uid::ModificationUid;
use crate::error::{ServiceError, ServiceResult};
use crate::recurrence::RecurrenceKey;

/// Persistence for items. Callers run each reconciliation under their own
/// single-writer transaction; implementations do not retry.
pub trait ItemStore {
    /// ## Summary
    /// Looks up an item by UID, active or not.
    #[must_use]
    fn get(&self, uid: &str) -> Option<Item>;

    /// ## Summary
    /// Stores a new item.
    ///
    /// ## Errors
    /// `ServiceError::ValidationError` if an item with the UID exists.
    fn create(&mut self, item: Item) -> ServiceResult<Item>;

    /// ## Summary
    /// Replaces a stored item.
    ///
    /// ## Errors
    /// `ServiceError::NotFound` if no item has the UID.
    fn update(&mut self, item: Item) -> ServiceResult<Item>;

    /// ## Summary
    /// Marks an item inactive without removing it.
    ///
    /// ## Errors
    /// `ServiceError::NotFound` if no item has the UID.
    fn deactivate(&mut self, uid: &str) -> ServiceResult<()>;

    /// Every modification owned by `master_uid`, active or not.
    #[must_use]
    fn modifications_of(&self, master_uid: &str) -> Vec<Item>;

    /// The modification of `master_uid` replacing occurrence `key`.
    #[must_use]
    fn find_modification(&self, master_uid: &str, key: &RecurrenceKey) -> Option<Item> {
        self.get(&ModificationUid::from_key(master_uid, key.clone()).to_string())
    }
}

/// Map-backed store. Reads hand out copies, so callers never alias stored
/// state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    items: BTreeMap<String, Item>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn iter(&self) -> impl Iterator<Item = &Item> {
        self.items.values()
    }
}

impl ItemStore for InMemoryStore {
    fn get(&self, uid: &str) -> Option<Item> {
        self.items.get(uid).cloned()
    }

    fn create(&mut self, item: Item) -> ServiceResult<Item> {
        if self.items.contains_key(&item.uid) {
            return Err(ServiceError::ValidationError(format!(
                "item {} already exists",
                item.uid
            )));
        }
        tracing::trace!(uid = %item.uid, "Creating item");
        self.items.insert(item.uid.clone(), item.clone());
        Ok(item)
    }

    fn update(&mut self, item: Item) -> ServiceResult<Item> {
        let Some(stored) = self.items.get_mut(&item.uid) else {
            return Err(ServiceError::NotFound(format!("item {}", item.uid)));
        };
        tracing::trace!(uid = %item.uid, "Updating item");
        *stored = item.clone();
        Ok(item)
    }

    fn deactivate(&mut self, uid: &str) -> ServiceResult<()> {
        let stored = self
            .items
            .get_mut(uid)
            .ok_or_else(|| ServiceError::NotFound(format!("item {uid}")))?;
        tracing::debug!(uid, "Deactivating item");
        stored.is_active = false;
        Ok(())
    }

    fn modifications_of(&self, master_uid: &str) -> Vec<Item> {
        self.items
            .values()
            .filter(|item| item.modifies.as_deref() == Some(master_uid))
            .cloned()
            .collect()
    }
}
