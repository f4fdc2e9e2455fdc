//! # Geofence
//!
//! Dispatch of geofence boundary crossings.
//!
//! When the platform's region-monitoring engine reports that a device entered or
//! left one or more registered fences, this crate turns that raw event into local
//! alerts, a single broadcast carrying the transition data, and best-effort webhook
//! deliveries, isolating each fence's failures from the others.
//!
//! ## Architecture
//!
//! - **Models**: fence records and engine transition events
//! - **Store**: the fence store interface and an in-memory implementation
//! - **Registry**: adding and removing fences with the monitoring engine
//! - **Dispatch**: resolver, alert presenter, broadcaster and webhook dispatcher
//!
//! ## Quick Start
//!
//! ```bash
//! # Replay an engine event against a set of fences
//! geofence replay --fences fences.json --event event.json
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod dispatch;
pub mod error;
pub mod models;
pub mod monitor;
pub mod registry;
pub mod store;

pub use config::Config;
pub use error::{Error, Result};

/// Re-exports for convenience
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::dispatch::{DispatchReport, TransitionPipeline};
    pub use crate::error::{Error, Result};
    pub use crate::models::*;
    pub use crate::registry::FenceRegistry;
    pub use crate::store::{FenceStore, MemoryFenceStore};
}
