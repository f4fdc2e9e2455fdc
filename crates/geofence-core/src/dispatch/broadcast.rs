//! Broadcast of transition results to in-process listeners

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, Instrument};

use crate::models::{ResolvedFence, TransitionKind};

use super::resolver::Resolution;

/// One message per transition event
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BroadcastMessage {
    /// The event could not be resolved
    Error {
        /// Rendered failure
        error: String,
    },
    /// The event resolved, possibly to no fences
    #[serde(rename_all = "camelCase")]
    Transition {
        /// Transition that fired
        transition_kind: TransitionKind,
        /// Resolved fences, with `transitionType` set to the fired transition
        records: Vec<ResolvedFence>,
    },
}

impl From<&Resolution> for BroadcastMessage {
    fn from(resolution: &Resolution) -> Self {
        match resolution {
            Resolution::Resolved { kind, fences } => Self::Transition {
                transition_kind: *kind,
                records: fences.clone(),
            },
            Resolution::Failed(err) => Self::Error {
                error: err.to_string(),
            },
        }
    }
}

/// The host's broadcast mechanism
pub trait BroadcastSink: Send + Sync {
    /// Emit without waiting for, or knowing about, consumers
    fn emit(&self, message: BroadcastMessage);
}

/// Sink over a tokio broadcast channel
#[derive(Debug, Clone)]
pub struct ChannelBroadcastSink {
    tx: broadcast::Sender<Arc<BroadcastMessage>>,
}

impl ChannelBroadcastSink {
    /// Create a sink retaining up to `capacity` messages for slow subscribers
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Listen for subsequent messages
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<BroadcastMessage>> {
        self.tx.subscribe()
    }
}

impl BroadcastSink for ChannelBroadcastSink {
    fn emit(&self, message: BroadcastMessage) {
        // Err only means nobody is listening
        if let Ok(receivers) = self.tx.send(Arc::new(message)) {
            debug!(receivers, "Transition broadcast sent");
        } else {
            debug!("Transition broadcast sent with no listeners");
        }
    }
}

/// Emits exactly one broadcast per transition event
pub struct EventBroadcaster {
    sink: Arc<dyn BroadcastSink>,
    span: tracing::Span,
}

impl EventBroadcaster {
    /// Create a broadcaster emitting into `sink`
    pub fn new(sink: Arc<dyn BroadcastSink>, span: tracing::Span) -> Self {
        Self { sink, span }
    }

    /// Build and emit the message for `resolution`, returning what was sent
    pub async fn broadcast(&self, resolution: &Resolution) -> BroadcastMessage {
        async {
            let message = BroadcastMessage::from(resolution);
            self.sink.emit(message.clone());
            message
        }
        .instrument(self.span.clone())
        .await
    }
}
