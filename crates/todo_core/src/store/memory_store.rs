//! In-memory record store.
//!
//! Records live in a `Vec` guarded by a mutex; ids come from a monotonic
//! counter that is never reset, so ids stay unique across `drop_all`.

use crate::model::record::{Fields, Record, RecordId};
use crate::store::{Store, StoreError, StoreResult};
use std::sync::{Mutex, MutexGuard};

struct MemoryState {
    records: Vec<Record>,
    next_id: i64,
}

/// Non-durable `Store` backend for tests and ephemeral sessions.
pub struct MemoryStore {
    collection: String,
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            state: Mutex::new(MemoryState {
                records: Vec::new(),
                next_id: 1,
            }),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| StoreError::LockPoisoned(self.collection.clone()))
    }
}

impl Store for MemoryStore {
    fn find(&self, predicate: &Fields) -> StoreResult<Vec<Record>> {
        let state = self.lock()?;
        Ok(state
            .records
            .iter()
            .filter(|record| record.matches(predicate))
            .cloned()
            .collect())
    }

    fn find_by_id(&self, id: RecordId) -> StoreResult<Option<Record>> {
        let state = self.lock()?;
        Ok(state.records.iter().find(|record| record.id == id).cloned())
    }

    fn find_all(&self) -> StoreResult<Vec<Record>> {
        Ok(self.lock()?.records.clone())
    }

    fn save(&self, data: Fields, id: Option<RecordId>) -> StoreResult<Vec<Record>> {
        let mut state = self.lock()?;
        match id {
            None => {
                let id = RecordId::new(state.next_id);
                state.next_id += 1;
                let record = Record::new(id, data);
                state.records.push(record.clone());
                Ok(vec![record])
            }
            Some(id) => {
                if let Some(record) = state.records.iter_mut().find(|record| record.id == id) {
                    record.merge(data);
                }
                Ok(state.records.clone())
            }
        }
    }

    fn remove(&self, id: RecordId) -> StoreResult<Vec<Record>> {
        let mut state = self.lock()?;
        if let Some(index) = state.records.iter().position(|record| record.id == id) {
            state.records.remove(index);
        }
        Ok(state.records.clone())
    }

    fn drop_all(&self) -> StoreResult<Vec<Record>> {
        let mut state = self.lock()?;
        state.records.clear();
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryStore;
    use crate::model::record::{Fields, RecordId};
    use crate::store::Store;
    use serde_json::json;

    fn fields(value: serde_json::Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn ids_are_not_reused_after_drop() {
        let store = MemoryStore::new("tasks");
        let first = store.save(fields(json!({"n": 1})), None).unwrap();
        store.drop_all().unwrap();
        let second = store.save(fields(json!({"n": 2})), None).unwrap();

        assert_eq!(first[0].id, RecordId::new(1));
        assert_eq!(second[0].id, RecordId::new(2));
    }

    #[test]
    fn save_ignores_caller_supplied_id_field() {
        let store = MemoryStore::new("tasks");
        let saved = store.save(fields(json!({"id": 77, "n": 1})), None).unwrap();
        assert_eq!(saved[0].id, RecordId::new(1));
        assert!(saved[0].get("id").is_none());
    }
}
