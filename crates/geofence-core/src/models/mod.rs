//! Data models for geofence

mod event;
mod fence;

pub use event::*;
pub use fence::*;
