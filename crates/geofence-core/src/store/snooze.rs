//! Temporarily silenced fences

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

/// Fence ids that must not dispatch until a deadline passes
///
/// Clones share the same underlying list, so the registry and the resolver see
/// each other's changes.
#[derive(Debug, Clone, Default)]
pub struct SnoozeList {
    until: Arc<RwLock<HashMap<String, DateTime<Utc>>>>,
}

impl SnoozeList {
    /// Create an empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Silence `id` for `duration` from `now`; a zero duration lifts the snooze
    pub fn snooze(&self, id: &str, duration: Duration, now: DateTime<Utc>) {
        if duration.is_zero() {
            self.clear(id);
            return;
        }

        let deadline = chrono::Duration::from_std(duration)
            .ok()
            .and_then(|duration| now.checked_add_signed(duration))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.until.write().insert(id.to_string(), deadline);
    }

    /// Whether `id` is silenced at `now`
    pub fn is_snoozed(&self, id: &str, now: DateTime<Utc>) -> bool {
        self.until
            .read()
            .get(id)
            .is_some_and(|deadline| *deadline > now)
    }

    /// Lift the snooze on `id`
    pub fn clear(&self, id: &str) {
        self.until.write().remove(id);
    }

    /// Lift every snooze
    pub fn clear_all(&self) {
        self.until.write().clear();
    }
}
