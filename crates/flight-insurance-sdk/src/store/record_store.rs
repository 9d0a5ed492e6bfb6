//! Typed access to the persisted policy cache.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use super::CacheSlot;
use crate::error::{PolicyError, Result};
use crate::reconcile::ReconcilePlan;
use crate::types::{PolicyRecord, PolicyStatus};

/// One persisted entry: a full record, or a bare id from the legacy shape.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredEntry {
    Record(PolicyRecord),
    Legacy(String),
}

/// Decoded slot contents.
#[derive(Default)]
struct Decoded {
    records: Vec<PolicyRecord>,
    /// Entries this version cannot read, written back verbatim
    unreadable: Vec<Value>,
    migrated: usize,
}

/// What `apply` changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AppliedChanges {
    pub added: usize,
    pub removed: usize,
}

/// Record store over a [`CacheSlot`].
///
/// Read-modify-write operations are serialized through an internal lock.
/// Clones share the slot and the lock.
#[derive(Clone)]
pub struct RecordStore {
    slot: Arc<dyn CacheSlot>,
    lock: Arc<Mutex<()>>,
}

impl RecordStore {
    pub fn new(slot: Arc<dyn CacheSlot>) -> Self {
        Self {
            slot,
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn location(&self) -> String {
        self.slot.name()
    }

    /// Load every cached record.
    ///
    /// Legacy entries are upgraded and written back before returning.
    /// Entries that do not decode are skipped with a warning and kept on
    /// disk. A cache that is not a JSON list is logged and treated as empty.
    pub fn load(&self) -> Vec<PolicyRecord> {
        let _guard = self.guard();
        self.load_locked()
    }

    /// Like [`load`](Self::load) but surfaces read and shape errors.
    pub fn try_load(&self) -> Result<Vec<PolicyRecord>> {
        let _guard = self.guard();
        self.try_load_locked()
    }

    /// Replace the cached records.
    ///
    /// Duplicate ids collapse to one entry at the first position, holding
    /// the last occurrence's data. Entries that did not decode are kept.
    pub fn save(&self, records: &[PolicyRecord]) -> Result<()> {
        let _guard = self.guard();
        let unreadable = self
            .decode()
            .map(|decoded| decoded.unreadable)
            .unwrap_or_default();
        self.save_locked(records, &unreadable)
    }

    /// Set the status of a cached policy. Returns `false`, writing nothing,
    /// when the id is not cached.
    ///
    /// This and the other read-modify-write operations fail with
    /// `CacheCorrupt`, leaving the slot untouched, when it is not a list.
    pub fn upsert_status(&self, policy_id: &str, status: PolicyStatus) -> Result<bool> {
        let _guard = self.guard();
        let Decoded {
            mut records,
            unreadable,
            ..
        } = self.load_for_update()?;

        let Some(record) = records.iter_mut().find(|r| r.policy_id == policy_id) else {
            debug!(policy_id, "Status update for uncached policy ignored");
            return Ok(false);
        };
        if record.status == status {
            return Ok(true);
        }
        record.status = status;

        self.save_locked(&records, &unreadable)?;
        info!(policy_id, status = %status, "Policy status updated");
        Ok(true)
    }

    /// Add or replace a record.
    pub fn insert(&self, record: PolicyRecord) -> Result<()> {
        let _guard = self.guard();
        let Decoded {
            mut records,
            unreadable,
            ..
        } = self.load_for_update()?;

        match records.iter_mut().find(|r| r.policy_id == record.policy_id) {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
        self.save_locked(&records, &unreadable)
    }

    /// Apply a plan's cache edits with a single write.
    pub fn apply(&self, plan: &ReconcilePlan) -> Result<AppliedChanges> {
        if !plan.has_local_edits() {
            return Ok(AppliedChanges::default());
        }

        let _guard = self.guard();
        let Decoded {
            mut records,
            unreadable,
            ..
        } = self.load_for_update()?;
        let before = records.len();

        records.retain(|r| !plan.to_remove.contains(&r.policy_id));
        let removed = before - records.len();

        let present: HashSet<String> = records.iter().map(|r| r.policy_id.clone()).collect();
        let additions: Vec<PolicyRecord> = plan
            .to_add
            .iter()
            .filter(|r| !present.contains(&r.policy_id))
            .cloned()
            .collect();
        let added = additions.len();
        records.extend(additions);

        if added == 0 && removed == 0 {
            return Ok(AppliedChanges::default());
        }

        self.save_locked(&records, &unreadable)?;
        info!(added, removed, cache = %self.slot.name(), "Reconciliation plan applied");
        Ok(AppliedChanges { added, removed })
    }

    pub fn contains(&self, policy_id: &str) -> bool {
        self.load().iter().any(|r| r.policy_id == policy_id)
    }

    /// Cached ids
    pub fn ids(&self) -> HashSet<String> {
        self.load().into_iter().map(|r| r.policy_id).collect()
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn load_locked(&self) -> Vec<PolicyRecord> {
        match self.try_load_locked() {
            Ok(records) => records,
            Err(err) => {
                warn!(cache = %self.slot.name(), error = %err, "Policy cache unusable, treating as empty");
                Vec::new()
            }
        }
    }

    fn try_load_locked(&self) -> Result<Vec<PolicyRecord>> {
        self.load_for_update().map(|decoded| decoded.records)
    }

    /// Decode and write back any legacy upgrade.
    fn load_for_update(&self) -> Result<Decoded> {
        let decoded = self.decode()?;
        if decoded.migrated > 0 {
            info!(migrated = decoded.migrated, cache = %self.slot.name(), "Upgrading legacy policy cache");
            if let Err(err) = self.save_locked(&decoded.records, &decoded.unreadable) {
                warn!(error = %err, "Failed to write back upgraded policy cache");
            }
        }
        Ok(decoded)
    }

    /// Decode the slot entry by entry. Never writes.
    fn decode(&self) -> Result<Decoded> {
        let Some(raw) = self.slot.read()? else {
            return Ok(Decoded::default());
        };
        if raw.trim().is_empty() {
            return Ok(Decoded::default());
        }

        let entries: Vec<Value> =
            serde_json::from_str(&raw).map_err(|e| PolicyError::CacheCorrupt(e.to_string()))?;

        let now = Utc::now();
        let mut decoded = Decoded::default();
        for (index, entry) in entries.into_iter().enumerate() {
            match StoredEntry::deserialize(&entry) {
                Ok(StoredEntry::Record(record)) => decoded.records.push(record),
                Ok(StoredEntry::Legacy(id)) => {
                    decoded.migrated += 1;
                    decoded.records.push(PolicyRecord::placeholder(id, now));
                }
                Err(err) => {
                    warn!(index, error = %err, cache = %self.slot.name(), "Skipping unreadable policy cache entry");
                    decoded.unreadable.push(entry);
                }
            }
        }
        Ok(decoded)
    }

    fn save_locked(&self, records: &[PolicyRecord], unreadable: &[Value]) -> Result<()> {
        let deduped = dedupe(records);
        let mut entries = deduped
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<Value>, _>>()?;
        entries.extend(unreadable.iter().cloned());

        let json = serde_json::to_string_pretty(&entries)?;
        self.slot.write(&json)?;
        debug!(
            records = deduped.len(),
            kept_unreadable = unreadable.len(),
            cache = %self.slot.name(),
            "Policy cache saved"
        );
        Ok(())
    }
}

fn dedupe(records: &[PolicyRecord]) -> Vec<PolicyRecord> {
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut out: Vec<PolicyRecord> = Vec::with_capacity(records.len());

    for record in records {
        match positions.get(record.policy_id.as_str()) {
            Some(&index) => out[index] = record.clone(),
            None => {
                positions.insert(record.policy_id.as_str(), out.len());
                out.push(record.clone());
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FileSlot, MemorySlot};
    use crate::types::UNKNOWN;
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    fn id(c: char) -> String {
        format!("0x{}", c.to_string().repeat(64))
    }

    fn memory_store() -> (Arc<MemorySlot>, RecordStore) {
        let slot = Arc::new(MemorySlot::new());
        (slot.clone(), RecordStore::new(slot))
    }

    #[test]
    fn test_legacy_shape_is_migrated_and_written_back() {
        let (a, b) = (id('a'), id('b'));
        let slot = Arc::new(MemorySlot::with_contents(
            serde_json::to_string(&[&a, &b]).unwrap(),
        ));
        let store = RecordStore::new(slot.clone());

        let records = store.load();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].policy_id, a);
        assert_eq!(records[1].policy_id, b);
        assert!(records.iter().all(|r| r.status == PolicyStatus::Active));
        assert!(records.iter().all(|r| r.flight_number == UNKNOWN));
        assert_eq!(slot.write_count(), 1);

        // Written back in the current shape; a second load does not rewrite
        let persisted: serde_json::Value =
            serde_json::from_str(&slot.contents().unwrap()).unwrap();
        assert_eq!(persisted[0]["policyId"], a.as_str());
        assert_eq!(store.load().len(), 2);
        assert_eq!(slot.write_count(), 1);
    }

    #[test]
    fn test_mixed_shapes_load() {
        let (a, b) = (id('a'), id('b'));
        let record = PolicyRecord::placeholder(a.clone(), Utc::now());
        let raw = serde_json::json!([record, b]).to_string();
        let store = RecordStore::new(Arc::new(MemorySlot::with_contents(raw)));

        let ids: Vec<String> = store.load().into_iter().map(|r| r.policy_id).collect();
        assert_eq!(ids, vec![a, b]);
    }

    #[test]
    fn test_corrupt_cache_is_empty() {
        let store = RecordStore::new(Arc::new(MemorySlot::with_contents("{\"not\": \"a list\"}")));
        assert!(store.load().is_empty());
        assert!(matches!(store.try_load(), Err(PolicyError::CacheCorrupt(_))));

        let store = RecordStore::new(Arc::new(MemorySlot::with_contents("[42]")));
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_unreadable_entry_survives_writes() {
        let (pending, valid, added) = (id('7'), id('9'), id('8'));
        let mut bad = serde_json::to_value(PolicyRecord::placeholder(pending.clone(), Utc::now())).unwrap();
        bad["status"] = "pending".into();
        let raw = serde_json::json!([bad, PolicyRecord::placeholder(valid.clone(), Utc::now())]);
        let slot = Arc::new(MemorySlot::with_contents(raw.to_string()));
        let store = RecordStore::new(slot.clone());

        let ids: Vec<String> = store.load().into_iter().map(|r| r.policy_id).collect();
        assert_eq!(ids, vec![valid.clone()]);

        store.insert(PolicyRecord::placeholder(added.clone(), Utc::now())).unwrap();

        let persisted: Vec<serde_json::Value> =
            serde_json::from_str(&slot.contents().unwrap()).unwrap();
        assert_eq!(persisted.len(), 3);
        assert!(persisted
            .iter()
            .any(|e| e["policyId"] == pending.as_str() && e["status"] == "pending"));
        assert_eq!(store.ids(), HashSet::from([valid, added]));
    }

    #[test]
    fn test_non_list_cache_is_never_overwritten() {
        let original = "{\"policies\": [\"0xabc\"]}";
        let slot = Arc::new(MemorySlot::with_contents(original));
        let store = RecordStore::new(slot.clone());

        assert!(store.load().is_empty());
        assert!(matches!(
            store.insert(PolicyRecord::placeholder(id('a'), Utc::now())),
            Err(PolicyError::CacheCorrupt(_))
        ));
        assert!(matches!(
            store.upsert_status(&id('a'), PolicyStatus::Claimed),
            Err(PolicyError::CacheCorrupt(_))
        ));
        let plan = ReconcilePlan {
            to_add: vec![PolicyRecord::placeholder(id('b'), Utc::now())],
            ..Default::default()
        };
        assert!(store.apply(&plan).is_err());

        assert_eq!(slot.write_count(), 0);
        assert_eq!(slot.contents().as_deref(), Some(original));
    }

    #[test]
    fn test_save_dedupes_last_wins() {
        let (_, store) = memory_store();
        let a = id('a');
        let first = PolicyRecord::placeholder(a.clone(), Utc::now());
        let mut second = first.clone();
        second.status = PolicyStatus::Claimed;
        let other = PolicyRecord::placeholder(id('b'), Utc::now());

        store.save(&[first, other, second]).unwrap();

        let records = store.load();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].policy_id, a);
        assert_eq!(records[0].status, PolicyStatus::Claimed);
    }

    #[test]
    fn test_upsert_status_absent_is_noop() {
        let (slot, store) = memory_store();
        assert!(!store.upsert_status(&id('a'), PolicyStatus::Claimed).unwrap());
        assert_eq!(slot.write_count(), 0);

        store.insert(PolicyRecord::placeholder(id('a'), Utc::now())).unwrap();
        assert!(store.upsert_status(&id('a'), PolicyStatus::Claimed).unwrap());
        assert_eq!(store.load()[0].status, PolicyStatus::Claimed);
    }

    #[test]
    fn test_apply_is_single_write() {
        let (slot, store) = memory_store();
        let (a, b, c) = (id('a'), id('b'), id('c'));
        store
            .save(&[
                PolicyRecord::placeholder(a.clone(), Utc::now()),
                PolicyRecord::placeholder(b.clone(), Utc::now()),
            ])
            .unwrap();
        let writes_before = slot.write_count();

        let plan = ReconcilePlan {
            to_add: vec![PolicyRecord::placeholder(c.clone(), Utc::now())],
            to_remove: BTreeSet::from([b.clone()]),
            ..Default::default()
        };
        let changes = store.apply(&plan).unwrap();

        assert_eq!(changes, AppliedChanges { added: 1, removed: 1 });
        assert_eq!(slot.write_count(), writes_before + 1);
        assert_eq!(store.ids(), HashSet::from([a, c]));

        // Empty plan writes nothing
        store.apply(&ReconcilePlan::default()).unwrap();
        assert_eq!(slot.write_count(), writes_before + 1);
    }

    #[test]
    fn test_file_backed_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("policies.json");
        std::fs::write(&path, format!("[\"{}\"]", id('d'))).unwrap();

        let store = RecordStore::new(Arc::new(FileSlot::new(&path)));
        assert!(store.contains(&id('d')));

        let on_disk = std::fs::read_to_string(&path).unwrap();
        assert!(on_disk.contains("\"policyId\""));
        assert!(on_disk.contains("\"createdAt\""));
    }
}
