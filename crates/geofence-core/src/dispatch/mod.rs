//! Transition dispatch
//!
//! Turns a raw engine event into local alerts, one broadcast, and webhook
//! deliveries, each isolated from the others' failures.

mod alert;
mod broadcast;
mod pipeline;
mod resolver;
mod webhook;

pub use alert::{AlertOutcome, AlertPresenter, NotificationFacility, PresentationError};
pub use broadcast::{BroadcastMessage, BroadcastSink, ChannelBroadcastSink, EventBroadcaster};
pub use pipeline::{DispatchReport, TransitionPipeline};
pub use resolver::{DispatchError, Resolution, TransitionResolver};
pub use webhook::{WebhookDispatcher, WebhookError, WebhookOutcome};
