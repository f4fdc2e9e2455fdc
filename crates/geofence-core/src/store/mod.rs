//! Fence storage
//!
//! The persistent key-value store is owned by the host; this module defines the
//! interface the pipeline consumes plus an in-memory implementation.

mod memory;
mod snooze;

pub use memory::MemoryFenceStore;
pub use snooze::SnoozeList;

use std::sync::Arc;

use crate::error::Result;
use crate::models::FenceRecord;

/// Key-value store of fence definitions, keyed by fence id
///
/// Implementations must tolerate concurrent readers.
#[async_trait::async_trait]
pub trait FenceStore: Send + Sync {
    /// Look up a single fence
    async fn get(&self, id: &str) -> Result<Option<Arc<FenceRecord>>>;

    /// All stored fences
    async fn list(&self) -> Result<Vec<Arc<FenceRecord>>>;

    /// Insert or replace a fence
    async fn put(&self, record: FenceRecord) -> Result<()>;

    /// Remove a fence; returns whether it existed
    async fn remove(&self, id: &str) -> Result<bool>;

    /// Remove every fence
    async fn clear(&self) -> Result<()>;
}
