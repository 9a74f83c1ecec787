use super::{DuplicateGroup, Store, UpsertOutcome};
use crate::error::StoreError;
use crate::model::{CutoffRecord, Entity, EntityId, EntityKind, NaturalKey};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct Inner {
    /// Append-only arena; id = index + 1
    entities: Vec<Entity>,
    names: HashMap<(EntityKind, String), EntityId>,
    cutoffs: BTreeMap<i64, CutoffRecord>,
    by_key: HashMap<NaturalKey, Vec<i64>>,
    next_seq: i64,
    unavailable: bool,
    #[cfg(test)]
    failing_names: HashSet<String>,
}

impl Inner {
    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable {
            Err(StoreError::Unavailable("memory store marked unavailable".into()))
        } else {
            Ok(())
        }
    }

    fn push_cutoff(&mut self, record: CutoffRecord) -> i64 {
        self.next_seq += 1;
        let seq = self.next_seq;
        self.by_key.entry(record.key.clone()).or_default().push(seq);
        self.cutoffs.insert(seq, record);
        seq
    }
}

/// In-process store with the same contract as the database
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of persisted records in insertion order
    pub async fn records(&self) -> Vec<(i64, CutoffRecord)> {
        let inner = self.inner.lock().await;
        inner
            .cutoffs
            .iter()
            .map(|(seq, record)| (*seq, record.clone()))
            .collect()
    }

    pub async fn entities(&self, kind: EntityKind) -> Vec<Entity> {
        let inner = self.inner.lock().await;
        inner
            .entities
            .iter()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect()
    }

    /// Append a record without key reconciliation, as legacy tooling did
    #[cfg(test)]
    pub(crate) async fn insert_unchecked(&self, record: CutoffRecord) -> i64 {
        self.inner.lock().await.push_cutoff(record)
    }

    #[cfg(test)]
    pub(crate) async fn set_unavailable(&self, unavailable: bool) {
        self.inner.lock().await.unavailable = unavailable;
    }

    /// Entity lookups for this name fail with a query error
    #[cfg(test)]
    pub(crate) async fn fail_lookups_for(&self, name: &str) {
        self.inner.lock().await.failing_names.insert(name.to_string());
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_entity(
        &self,
        kind: EntityKind,
        name: &str,
    ) -> Result<Option<EntityId>, StoreError> {
        let inner = self.inner.lock().await;
        inner.check_available()?;
        #[cfg(test)]
        if inner.failing_names.contains(name) {
            return Err(StoreError::Query(format!("lookup of {:?} failed", name)));
        }
        Ok(inner.names.get(&(kind, name.to_string())).copied())
    }

    async fn insert_entity(&self, kind: EntityKind, name: &str) -> Result<EntityId, StoreError> {
        let mut inner = self.inner.lock().await;
        inner.check_available()?;
        if let Some(id) = inner.names.get(&(kind, name.to_string())) {
            return Ok(*id);
        }
        let id = EntityId(inner.entities.len() as i64 + 1);
        inner.entities.push(Entity {
            id,
            kind,
            name: name.to_string(),
            city: None,
            state: None,
            category: None,
        });
        inner.names.insert((kind, name.to_string()), id);
        Ok(id)
    }

    async fn upsert_cutoff(&self, record: &CutoffRecord) -> Result<UpsertOutcome, StoreError> {
        let mut inner = self.inner.lock().await;
        inner.check_available()?;
        let existing = inner.by_key.get(&record.key).cloned().unwrap_or_default();
        if existing.is_empty() {
            inner.push_cutoff(record.clone());
            return Ok(UpsertOutcome::Inserted);
        }
        for seq in existing {
            if let Some(stored) = inner.cutoffs.get_mut(&seq) {
                stored.provenance = record.provenance.clone();
            }
        }
        Ok(UpsertOutcome::Replaced)
    }

    async fn duplicate_groups(&self) -> Result<Vec<DuplicateGroup>, StoreError> {
        let inner = self.inner.lock().await;
        inner.check_available()?;
        let mut groups: Vec<DuplicateGroup> = inner
            .by_key
            .iter()
            .filter(|(_, seqs)| seqs.len() > 1)
            .map(|(key, seqs)| {
                let mut seqs = seqs.clone();
                seqs.sort_unstable();
                DuplicateGroup {
                    key: key.clone(),
                    seqs,
                }
            })
            .collect();
        groups.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(groups)
    }

    async fn delete_cutoffs(&self, seqs: &[i64]) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().await;
        inner.check_available()?;

        let unique: HashSet<i64> = seqs.iter().copied().collect();
        if unique.len() != seqs.len() || !unique.iter().all(|s| inner.cutoffs.contains_key(s)) {
            return Err(StoreError::Integrity(format!(
                "planned to delete {} records, not all exist",
                seqs.len()
            )));
        }

        for seq in &unique {
            let Some(record) = inner.cutoffs.remove(seq) else {
                continue;
            };
            let drained = match inner.by_key.get_mut(&record.key) {
                Some(group) => {
                    group.retain(|s| s != seq);
                    group.is_empty()
                }
                None => false,
            };
            if drained {
                inner.by_key.remove(&record.key);
            }
        }
        Ok(unique.len() as u64)
    }

    async fn cutoff_count(&self) -> Result<u64, StoreError> {
        let inner = self.inner.lock().await;
        inner.check_available()?;
        Ok(inner.cutoffs.len() as u64)
    }

    async fn entity_count(&self, kind: EntityKind) -> Result<u64, StoreError> {
        let inner = self.inner.lock().await;
        inner.check_available()?;
        Ok(inner.entities.iter().filter(|e| e.kind == kind).count() as u64)
    }
}
