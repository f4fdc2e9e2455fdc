//! Transition events raised by the region-monitoring engine

use serde::{Deserialize, Serialize};

use super::fence::TransitionKind;

/// Raw callback payload from the monitoring engine
///
/// Region ids may repeat when the engine reports the same region twice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TransitionEvent {
    /// The engine reported a fault instead of a transition
    #[serde(rename_all = "camelCase")]
    Error {
        /// Engine-specific error code
        error_code: i32,
        /// Human-readable detail, possibly empty
        #[serde(default)]
        message: String,
    },

    /// One or more regions were crossed
    #[serde(rename_all = "camelCase")]
    Transition {
        /// Raw engine transition code (1 = ENTER, 2 = EXIT)
        transition_code: i32,
        /// Triggered region ids, in engine order
        region_ids: Vec<String>,
    },
}

impl TransitionEvent {
    /// Build a transition event for a known kind
    pub fn transition<I, S>(kind: TransitionKind, region_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Transition {
            transition_code: i32::from(kind.code()),
            region_ids: region_ids.into_iter().map(Into::into).collect(),
        }
    }

    /// Build an engine error event
    pub fn error(error_code: i32, message: impl Into<String>) -> Self {
        Self::Error {
            error_code,
            message: message.into(),
        }
    }

    /// Triggered region ids; empty for error events
    pub fn region_ids(&self) -> &[String] {
        match self {
            Self::Error { .. } => &[],
            Self::Transition { region_ids, .. } => region_ids,
        }
    }
}
