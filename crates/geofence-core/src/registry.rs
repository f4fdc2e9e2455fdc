//! Fence registration
//!
//! Keeps the fence store and the monitoring engine in step when the host adds or
//! removes fences.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info};

use crate::config::MonitoringConfig;
use crate::error::Result;
use crate::models::FenceRecord;
use crate::monitor::{MonitoredRegion, RegionMonitor};
use crate::store::{FenceStore, SnoozeList};

/// Registers and removes fences
pub struct FenceRegistry {
    store: Arc<dyn FenceStore>,
    monitor: Arc<dyn RegionMonitor>,
    default_loitering_delay: Duration,
    snoozes: SnoozeList,
    span: tracing::Span,
}

impl FenceRegistry {
    /// Create a registry logging under `span`
    pub fn new(
        store: Arc<dyn FenceStore>,
        monitor: Arc<dyn RegionMonitor>,
        config: &MonitoringConfig,
        span: tracing::Span,
    ) -> Self {
        Self {
            store,
            monitor,
            default_loitering_delay: config.default_loitering_delay,
            snoozes: SnoozeList::new(),
            span,
        }
    }

    /// Snooze list to share with the transition pipeline
    pub fn snoozes(&self) -> SnoozeList {
        self.snoozes.clone()
    }

    /// Silence a fence for `duration`; zero lifts an existing snooze
    pub fn snooze(&self, id: &str, duration: Duration) {
        self.snoozes.snooze(id, duration, Utc::now());
        self.span
            .in_scope(|| info!(fence_id = %id, seconds = duration.as_secs(), "Fence snoozed"));
    }

    /// Validate, persist and start monitoring `records`
    ///
    /// The batch is rejected as a whole if any record is invalid.
    pub async fn add_or_update(&self, records: Vec<FenceRecord>) -> Result<()> {
        for record in &records {
            record.validate()?;
        }

        let regions: Vec<MonitoredRegion> = records
            .iter()
            .map(|record| MonitoredRegion::from_record(record, self.default_loitering_delay))
            .collect();

        for record in records {
            self.span.in_scope(|| debug!(fence_id = %record.id, "Storing fence"));
            self.store.put(record).await?;
        }

        let count = regions.len();
        self.monitor.start_monitoring(regions).await?;
        self.span.in_scope(|| info!(count, "Fences registered"));
        Ok(())
    }

    /// Remove fences by id and stop monitoring them
    pub async fn remove(&self, ids: Vec<String>) -> Result<()> {
        for id in &ids {
            self.snoozes.clear(id);
            if !self.store.remove(id).await? {
                self.span.in_scope(|| debug!(fence_id = %id, "Fence was not stored"));
            }
        }

        let count = ids.len();
        self.monitor.stop_monitoring(ids).await?;
        self.span.in_scope(|| info!(count, "Fences removed"));
        Ok(())
    }

    /// Remove every fence
    pub async fn remove_all(&self) -> Result<()> {
        let ids: Vec<String> = self
            .store
            .list()
            .await?
            .iter()
            .map(|record| record.id.clone())
            .collect();

        self.store.clear().await?;
        self.snoozes.clear_all();
        self.monitor.stop_monitoring(ids).await?;
        self.span.in_scope(|| info!("All fences removed"));
        Ok(())
    }

    /// All fences currently stored
    pub async fn watched(&self) -> Result<Vec<Arc<FenceRecord>>> {
        self.store.list().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TransitionMask;
    use crate::store::MemoryFenceStore;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingMonitor {
        started: Mutex<Vec<MonitoredRegion>>,
        stopped: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl RegionMonitor for RecordingMonitor {
        async fn start_monitoring(&self, regions: Vec<MonitoredRegion>) -> Result<()> {
            self.started.lock().extend(regions);
            Ok(())
        }

        async fn stop_monitoring(&self, ids: Vec<String>) -> Result<()> {
            self.stopped.lock().extend(ids);
            Ok(())
        }
    }

    fn setup() -> (FenceRegistry, MemoryFenceStore, Arc<RecordingMonitor>) {
        let store = MemoryFenceStore::new();
        let monitor = Arc::new(RecordingMonitor::default());
        let registry = FenceRegistry::new(
            Arc::new(store.clone()),
            monitor.clone(),
            &MonitoringConfig::default(),
            tracing::Span::none(),
        );
        (registry, store, monitor)
    }

    fn fence(id: &str, loitering_delay_ms: u64) -> FenceRecord {
        let mut record = FenceRecord::new(id, 48.1, 11.6, 200, TransitionMask::BOTH);
        record.loitering_delay_ms = loitering_delay_ms;
        record
    }

    #[tokio::test]
    async fn test_zero_loitering_delay_registers_one_hour() {
        let (registry, _store, monitor) = setup();

        registry
            .add_or_update(vec![fence("a", 0), fence("b", 5_000)])
            .await
            .unwrap();

        let started = monitor.started.lock();
        assert_eq!(started[0].loitering_delay, Duration::from_millis(3_600_000));
        assert_eq!(started[1].loitering_delay, Duration::from_secs(5));
        assert!(started.iter().all(|region| region.expiration.is_none()));
    }

    #[tokio::test]
    async fn test_invalid_batch_has_no_side_effects() {
        let (registry, store, monitor) = setup();
        let mut bad = fence("bad", 0);
        bad.radius = 0;

        let result = registry.add_or_update(vec![fence("a", 0), bad]).await;

        assert!(result.is_err());
        assert!(store.is_empty());
        assert!(monitor.started.lock().is_empty());
    }

    struct OfflineMonitor;

    #[async_trait::async_trait]
    impl RegionMonitor for OfflineMonitor {
        async fn start_monitoring(&self, _regions: Vec<MonitoredRegion>) -> Result<()> {
            Err(crate::error::Error::monitor("engine unavailable"))
        }

        async fn stop_monitoring(&self, _ids: Vec<String>) -> Result<()> {
            Err(crate::error::Error::monitor("engine unavailable"))
        }
    }

    #[tokio::test]
    async fn test_engine_failure_is_reported() {
        let registry = FenceRegistry::new(
            Arc::new(MemoryFenceStore::new()),
            Arc::new(OfflineMonitor),
            &MonitoringConfig::default(),
            tracing::Span::none(),
        );

        let err = registry.add_or_update(vec![fence("a", 0)]).await.unwrap_err();

        assert!(matches!(err, crate::error::Error::Monitor(_)));
    }

    #[tokio::test]
    async fn test_remove_and_remove_all() {
        let (registry, store, monitor) = setup();
        registry
            .add_or_update(vec![fence("a", 0), fence("b", 0), fence("c", 0)])
            .await
            .unwrap();

        registry.remove(vec!["a".to_string()]).await.unwrap();
        assert_eq!(registry.watched().await.unwrap().len(), 2);

        registry.remove_all().await.unwrap();
        assert!(store.is_empty());
        assert_eq!(*monitor.stopped.lock(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_remove_lifts_snooze() {
        let (registry, _store, _monitor) = setup();
        let snoozes = registry.snoozes();
        registry
            .add_or_update(vec![fence("a", 0), fence("b", 0)])
            .await
            .unwrap();

        registry.snooze("a", Duration::from_secs(86_400));
        registry.snooze("b", Duration::from_secs(300));
        assert!(snoozes.is_snoozed("a", Utc::now()));

        registry.remove(vec!["a".to_string()]).await.unwrap();
        assert!(!snoozes.is_snoozed("a", Utc::now()));
        assert!(snoozes.is_snoozed("b", Utc::now()));

        registry.remove_all().await.unwrap();
        assert!(!snoozes.is_snoozed("b", Utc::now()));
    }
}
