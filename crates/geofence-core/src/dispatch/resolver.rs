//! Resolution of triggered region ids into stored fences

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, warn, Instrument};

use crate::models::{ResolvedFence, TransitionEvent, TransitionKind};
use crate::store::{FenceStore, SnoozeList};

/// Failure reported by the engine or found while validating its event
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// The engine reported a fault
    #[error("Location Services error: {code}{}", format_detail(.message))]
    Engine {
        /// Engine-specific error code
        code: i32,
        /// Detail supplied by the engine, possibly empty
        message: String,
    },

    /// The event carried a transition code other than ENTER or EXIT
    #[error("Geofence transition error: {0}")]
    UnknownTransitionKind(i32),
}

fn format_detail(message: &str) -> String {
    if message.is_empty() {
        String::new()
    } else {
        format!(" ({message})")
    }
}

/// Outcome of resolving one transition event
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// The event was a valid transition; `fences` may be empty
    Resolved {
        /// Transition that fired
        kind: TransitionKind,
        /// Matched fences in trigger order
        fences: Vec<ResolvedFence>,
    },
    /// The event was an error or carried an unknown transition
    Failed(DispatchError),
}

impl Resolution {
    /// Matched fences; empty on failure
    pub fn fences(&self) -> &[ResolvedFence] {
        match self {
            Self::Resolved { fences, .. } => fences,
            Self::Failed(_) => &[],
        }
    }

    /// Transition that fired, if the event was valid
    pub fn kind(&self) -> Option<TransitionKind> {
        match self {
            Self::Resolved { kind, .. } => Some(*kind),
            Self::Failed(_) => None,
        }
    }

    /// The failure, if any
    pub fn error(&self) -> Option<&DispatchError> {
        match self {
            Self::Resolved { .. } => None,
            Self::Failed(err) => Some(err),
        }
    }
}

/// Maps triggered region ids to stored fences
pub struct TransitionResolver {
    store: Arc<dyn FenceStore>,
    snoozes: SnoozeList,
    span: tracing::Span,
}

impl TransitionResolver {
    /// Create a resolver reading from `store`
    pub fn new(store: Arc<dyn FenceStore>, span: tracing::Span) -> Self {
        Self {
            store,
            snoozes: SnoozeList::new(),
            span,
        }
    }

    /// Skip fences silenced in `snoozes`
    #[must_use]
    pub fn with_snoozes(mut self, snoozes: SnoozeList) -> Self {
        self.snoozes = snoozes;
        self
    }

    /// Resolve an event; never fails, errors come back as [`Resolution::Failed`]
    pub async fn resolve(&self, event: &TransitionEvent) -> Resolution {
        async {
            match event {
                TransitionEvent::Error {
                    error_code,
                    message,
                } => {
                    let err = DispatchError::Engine {
                        code: *error_code,
                        message: message.clone(),
                    };
                    error!(error_code, "{}", err);
                    Resolution::Failed(err)
                }
                TransitionEvent::Transition {
                    transition_code,
                    region_ids,
                } => match TransitionKind::from_code(*transition_code) {
                    Some(kind) => {
                        debug!(transition = %kind, count = region_ids.len(), "Geofence transition detected");
                        let fences = self.lookup(region_ids, kind).await;
                        Resolution::Resolved { kind, fences }
                    }
                    None => {
                        let err = DispatchError::UnknownTransitionKind(*transition_code);
                        error!(transition_code, "{}", err);
                        Resolution::Failed(err)
                    }
                },
            }
        }
        .instrument(self.span.clone())
        .await
    }

    /// Look up `ids` in order, skipping those no longer stored, snoozed, or
    /// outside their active window
    pub async fn lookup(&self, ids: &[String], kind: TransitionKind) -> Vec<ResolvedFence> {
        let now = Utc::now();
        let mut fences = Vec::with_capacity(ids.len());

        for id in ids {
            match self.store.get(id).await {
                Ok(Some(_)) if self.snoozes.is_snoozed(id, now) => {
                    debug!(fence_id = %id, "Fence is snoozed, skipping");
                }
                Ok(Some(record)) if !record.is_active_at(now) => {
                    debug!(fence_id = %id, "Fence outside its active window, skipping");
                }
                Ok(Some(record)) => fences.push(ResolvedFence::new(record, kind)),
                Ok(None) => {
                    debug!(fence_id = %id, "Triggered fence no longer stored, skipping");
                }
                Err(e) => {
                    warn!(fence_id = %id, error = %e, "Failed to read fence, skipping");
                }
            }
        }

        fences
    }
}
