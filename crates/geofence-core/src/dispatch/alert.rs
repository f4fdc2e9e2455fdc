//! Local alert presentation

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, info, warn, Instrument};

use crate::models::ResolvedFence;

/// The platform rejected an alert
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Presentation failed: {0}")]
pub struct PresentationError(pub String);

/// Platform facility that shows local notifications
#[async_trait::async_trait]
pub trait NotificationFacility: Send + Sync {
    /// Show `alert`, forwarded verbatim from the fence record
    async fn present(&self, alert: &serde_json::Value) -> Result<(), PresentationError>;

    /// Remove delivered alerts by notification id
    async fn dismiss(&self, _ids: &[String]) -> Result<(), PresentationError> {
        Ok(())
    }
}

/// Result of presenting one fence's alert
#[derive(Debug, Clone, PartialEq)]
pub struct AlertOutcome {
    /// Fence whose alert was presented
    pub fence_id: String,
    /// What the facility reported
    pub result: Result<(), PresentationError>,
}

impl AlertOutcome {
    /// Whether the facility accepted the alert
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Notification id used for frequency control; falls back to the fence id
fn notification_key(alert: &serde_json::Value, fence_id: &str) -> String {
    match alert.get("id") {
        Some(serde_json::Value::String(id)) => id.clone(),
        Some(serde_json::Value::Null) | None => fence_id.to_string(),
        Some(other) => other.to_string(),
    }
}

/// Issues one local alert per resolved fence that carries one
///
/// An alert with a numeric `frequency` (seconds) is skipped while less than
/// that long has passed since the same notification id was last triggered.
pub struct AlertPresenter {
    facility: Arc<dyn NotificationFacility>,
    last_triggered: Mutex<HashMap<String, DateTime<Utc>>>,
    span: tracing::Span,
}

impl AlertPresenter {
    /// Create a presenter showing alerts through `facility`
    pub fn new(facility: Arc<dyn NotificationFacility>, span: tracing::Span) -> Self {
        Self {
            facility,
            last_triggered: Mutex::new(HashMap::new()),
            span,
        }
    }

    /// Record a trigger for `alert` at `now`, or return false if it is still
    /// inside its frequency interval
    fn try_trigger(&self, alert: &serde_json::Value, fence_id: &str, now: DateTime<Utc>) -> bool {
        let key = notification_key(alert, fence_id);
        let mut last_triggered = self.last_triggered.lock();

        if let (Some(frequency), Some(last)) = (
            alert.get("frequency").and_then(serde_json::Value::as_i64),
            last_triggered.get(&key),
        ) {
            if now < *last + chrono::Duration::seconds(frequency) {
                return false;
            }
        }

        last_triggered.insert(key, now);
        true
    }

    /// Ask the facility to remove delivered alerts; failures are logged
    pub async fn dismiss(&self, ids: &[String]) {
        async {
            match self.facility.dismiss(ids).await {
                Ok(()) => info!(count = ids.len(), "Local alerts dismissed"),
                Err(e) => warn!(error = %e, "Failed to dismiss local alerts"),
            }
        }
        .instrument(self.span.clone())
        .await
    }

    /// Present alerts in resolved order; one failure never stops the rest
    pub async fn present_all(&self, fences: &[ResolvedFence]) -> Vec<AlertOutcome> {
        async {
            let now = Utc::now();
            let mut outcomes = Vec::new();

            for fence in fences {
                let Some(alert) = fence.record.local_alert.as_ref() else {
                    continue;
                };

                if !self.try_trigger(alert, fence.id(), now) {
                    debug!(fence_id = %fence.id(), "Frequency control, skipping local alert");
                    continue;
                }

                let result = self.facility.present(alert).await;
                match &result {
                    Ok(()) => debug!(fence_id = %fence.id(), "Local alert presented"),
                    Err(e) => warn!(fence_id = %fence.id(), error = %e, "Failed to present local alert"),
                }

                outcomes.push(AlertOutcome {
                    fence_id: fence.id().to_string(),
                    result,
                });
            }

            outcomes
        }
        .instrument(self.span.clone())
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FenceRecord, TransitionKind, TransitionMask};
    use serde_json::json;

    #[derive(Default)]
    struct FlakyFacility {
        shown: Mutex<Vec<serde_json::Value>>,
        dismissed: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl NotificationFacility for FlakyFacility {
        async fn present(&self, alert: &serde_json::Value) -> Result<(), PresentationError> {
            if alert["reject"] == true {
                return Err(PresentationError("channel disabled".to_string()));
            }
            self.shown.lock().push(alert.clone());
            Ok(())
        }

        async fn dismiss(&self, ids: &[String]) -> Result<(), PresentationError> {
            self.dismissed.lock().extend_from_slice(ids);
            Ok(())
        }
    }

    fn resolved(id: &str, alert: Option<serde_json::Value>) -> ResolvedFence {
        let mut record = FenceRecord::new(id, 0.0, 0.0, 10, TransitionMask::ENTER);
        record.local_alert = alert;
        ResolvedFence::new(Arc::new(record), TransitionKind::Enter)
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let facility = Arc::new(FlakyFacility::default());
        let presenter = AlertPresenter::new(facility.clone(), tracing::Span::none());
        let fences = vec![
            resolved("a", Some(json!({"reject": true}))),
            resolved("b", None),
            resolved("c", Some(json!({"title": "Hello"}))),
        ];

        let outcomes = presenter.present_all(&fences).await;

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].fence_id, "a");
        assert!(!outcomes[0].is_success());
        assert_eq!(outcomes[1].fence_id, "c");
        assert!(outcomes[1].is_success());
        assert_eq!(*facility.shown.lock(), vec![json!({"title": "Hello"})]);
    }

    #[tokio::test]
    async fn test_frequency_suppresses_repeat_alerts() {
        let facility = Arc::new(FlakyFacility::default());
        let presenter = AlertPresenter::new(facility.clone(), tracing::Span::none());
        let limited = resolved("a", Some(json!({"id": 7, "frequency": 3600})));
        let unlimited = resolved("b", Some(json!({"id": 8})));

        let first = presenter
            .present_all(&[limited.clone(), unlimited.clone()])
            .await;
        let second = presenter.present_all(&[limited, unlimited]).await;

        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].fence_id, "b");
        assert_eq!(facility.shown.lock().len(), 3);
    }

    #[test]
    fn test_frequency_interval_elapses() {
        let presenter =
            AlertPresenter::new(Arc::new(FlakyFacility::default()), tracing::Span::none());
        let alert = json!({"id": "n1", "frequency": 60});
        let now = Utc::now();

        assert!(presenter.try_trigger(&alert, "a", now));
        assert!(!presenter.try_trigger(&alert, "b", now + chrono::Duration::seconds(59)));
        assert!(presenter.try_trigger(&alert, "a", now + chrono::Duration::seconds(60)));
    }

    #[tokio::test]
    async fn test_dismiss_forwards_ids() {
        let facility = Arc::new(FlakyFacility::default());
        let presenter = AlertPresenter::new(facility.clone(), tracing::Span::none());

        presenter.dismiss(&["7".to_string(), "8".to_string()]).await;

        assert_eq!(*facility.dismissed.lock(), vec!["7", "8"]);
    }
}
