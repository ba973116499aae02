//! Items, their facets and the stores that hold them.

mod id;
mod model;
mod modification_uid;
mod store;

pub use id::{IdGenerator, UuidGenerator};
pub use model::{Facet, FacetKind, Item, TriageCode, TriageStatus};
pub use modification_uid::ModificationUid;
pub use store::{InMemoryStore, ItemStore};
