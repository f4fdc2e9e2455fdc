//! End-to-end handling of one transition event
//!
//! Resolution runs first. Alerts and the broadcast then run alongside webhook
//! delivery, so a slow webhook never holds up local delivery.

use std::sync::Arc;

use tracing::{debug, info, Instrument};

use crate::config::Config;
use crate::error::Result;
use crate::models::TransitionEvent;
use crate::store::{FenceStore, SnoozeList};

use super::alert::{AlertOutcome, AlertPresenter, NotificationFacility};
use super::broadcast::{BroadcastMessage, BroadcastSink, EventBroadcaster};
use super::resolver::{Resolution, TransitionResolver};
use super::webhook::{WebhookDispatcher, WebhookOutcome};

/// Everything that happened while dispatching one event
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchReport {
    /// How the event resolved
    pub resolution: Resolution,
    /// The single broadcast that was emitted
    pub broadcast: BroadcastMessage,
    /// One entry per fence that carried a local alert
    pub alerts: Vec<AlertOutcome>,
    /// One entry per triggered fence that carried a webhook URL
    pub webhooks: Vec<WebhookOutcome>,
}

impl DispatchReport {
    /// Number of webhook deliveries that failed
    pub fn failed_webhooks(&self) -> usize {
        self.webhooks.iter().filter(|w| !w.is_success()).count()
    }

    /// Number of alerts the platform rejected
    pub fn failed_alerts(&self) -> usize {
        self.alerts.iter().filter(|a| !a.is_success()).count()
    }
}

/// Owns the dispatch components and the span they log under
pub struct TransitionPipeline {
    resolver: TransitionResolver,
    presenter: AlertPresenter,
    broadcaster: EventBroadcaster,
    webhooks: WebhookDispatcher,
    span: tracing::Span,
}

impl TransitionPipeline {
    /// Build a pipeline; every component logs under `span`
    pub fn new(
        config: &Config,
        store: Arc<dyn FenceStore>,
        facility: Arc<dyn NotificationFacility>,
        sink: Arc<dyn BroadcastSink>,
        span: tracing::Span,
    ) -> Result<Self> {
        Ok(Self {
            resolver: TransitionResolver::new(store, span.clone()),
            presenter: AlertPresenter::new(facility, span.clone()),
            broadcaster: EventBroadcaster::new(sink, span.clone()),
            webhooks: WebhookDispatcher::new(&config.webhook, span.clone())?,
            span,
        })
    }

    /// Skip fences silenced in `snoozes`, typically [`FenceRegistry::snoozes`]
    ///
    /// [`FenceRegistry::snoozes`]: crate::registry::FenceRegistry::snoozes
    #[must_use]
    pub fn with_snoozes(mut self, snoozes: SnoozeList) -> Self {
        self.resolver = self.resolver.with_snoozes(snoozes);
        self
    }

    /// Remove already-delivered local alerts by notification id
    pub async fn dismiss_alerts(&self, ids: &[String]) {
        self.presenter.dismiss(ids).await;
    }

    /// Run one event to completion; failures are captured in the report
    pub async fn dispatch(&self, event: &TransitionEvent) -> DispatchReport {
        async {
            debug!("Handling transition event");

            let resolution = self.resolver.resolve(event).await;

            let local = async {
                let alerts = self.presenter.present_all(resolution.fences()).await;
                let broadcast = self.broadcaster.broadcast(&resolution).await;
                (alerts, broadcast)
            };

            // Webhooks look the original ids up again rather than reusing the
            // resolved set.
            let remote = async {
                match resolution.kind() {
                    Some(kind) => {
                        let fences = self.resolver.lookup(event.region_ids(), kind).await;
                        self.webhooks.deliver_all(&fences).await
                    }
                    None => Vec::new(),
                }
            };

            let ((alerts, broadcast), webhooks) = tokio::join!(local, remote);

            let report = DispatchReport {
                resolution,
                broadcast,
                alerts,
                webhooks,
            };

            info!(
                resolved = report.resolution.fences().len(),
                alerts = report.alerts.len(),
                failed_alerts = report.failed_alerts(),
                webhooks = report.webhooks.len(),
                failed_webhooks = report.failed_webhooks(),
                "Transition event dispatched"
            );

            report
        }
        .instrument(self.span.clone())
        .await
    }
}
