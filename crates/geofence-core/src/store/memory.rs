//! In-memory fence store

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::Result;
use crate::models::FenceRecord;

use super::FenceStore;

/// Fence store backed by a map behind a read-write lock
#[derive(Debug, Clone, Default)]
pub struct MemoryFenceStore {
    fences: Arc<RwLock<BTreeMap<String, Arc<FenceRecord>>>>,
}

impl MemoryFenceStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `records`; later duplicates win
    pub fn from_records(records: impl IntoIterator<Item = FenceRecord>) -> Self {
        let fences = records
            .into_iter()
            .map(|record| (record.id.clone(), Arc::new(record)))
            .collect();

        Self {
            fences: Arc::new(RwLock::new(fences)),
        }
    }

    /// Number of stored fences
    pub fn len(&self) -> usize {
        self.fences.read().len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.fences.read().is_empty()
    }
}

#[async_trait::async_trait]
impl FenceStore for MemoryFenceStore {
    async fn get(&self, id: &str) -> Result<Option<Arc<FenceRecord>>> {
        Ok(self.fences.read().get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<Arc<FenceRecord>>> {
        Ok(self.fences.read().values().cloned().collect())
    }

    async fn put(&self, record: FenceRecord) -> Result<()> {
        self.fences
            .write()
            .insert(record.id.clone(), Arc::new(record));
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<bool> {
        Ok(self.fences.write().remove(id).is_some())
    }

    async fn clear(&self) -> Result<()> {
        self.fences.write().clear();
        Ok(())
    }
}
