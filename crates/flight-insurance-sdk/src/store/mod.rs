//! Local policy cache
//!
//! - `CacheSlot`: one named slot holding the serialized cache
//! - `FileSlot`: JSON file, replaced atomically on write
//! - `MemorySlot`: in-memory slot for tests
//! - `RecordStore`: typed access, legacy migration, plan application

mod record_store;
mod slot;

pub use record_store::{AppliedChanges, RecordStore};
pub use slot::{CacheSlot, FileSlot, MemorySlot};
