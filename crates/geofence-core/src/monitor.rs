//! Interface to the platform's region-monitoring engine

use std::time::Duration;

use crate::error::Result;
use crate::models::{FenceRecord, TransitionMask};

/// Region as handed to the monitoring engine
#[derive(Debug, Clone, PartialEq)]
pub struct MonitoredRegion {
    /// Fence id, echoed back in transition events
    pub id: String,
    /// Center latitude in degrees
    pub latitude: f64,
    /// Center longitude in degrees
    pub longitude: f64,
    /// Radius in meters
    pub radius: u32,
    /// Transitions to report
    pub transitions: TransitionMask,
    /// Dwell time before a loitering transition; never zero
    pub loitering_delay: Duration,
    /// `None` keeps the region monitored until removed
    pub expiration: Option<Duration>,
}

impl MonitoredRegion {
    /// Build the engine request for `record`, substituting `default_loitering_delay`
    /// when the record asks for zero.
    pub fn from_record(record: &FenceRecord, default_loitering_delay: Duration) -> Self {
        Self {
            id: record.id.clone(),
            latitude: record.latitude,
            longitude: record.longitude,
            radius: record.radius,
            transitions: record.transition_type,
            loitering_delay: record.effective_loitering_delay(default_loitering_delay),
            expiration: None,
        }
    }
}

/// The host's region-monitoring engine
#[async_trait::async_trait]
pub trait RegionMonitor: Send + Sync {
    /// Start (or restart) monitoring the given regions
    async fn start_monitoring(&self, regions: Vec<MonitoredRegion>) -> Result<()>;

    /// Stop monitoring the given region ids
    async fn stop_monitoring(&self, ids: Vec<String>) -> Result<()>;
}
