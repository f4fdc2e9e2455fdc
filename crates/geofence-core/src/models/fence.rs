//! Fence data models

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::{Error, Result};

/// A boundary crossing that actually fired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransitionKind {
    /// Device moved into the fence
    Enter,
    /// Device moved out of the fence
    Exit,
}

impl TransitionKind {
    /// Engine code for this transition
    pub const fn code(self) -> u8 {
        match self {
            Self::Enter => TransitionMask::ENTER.0,
            Self::Exit => TransitionMask::EXIT.0,
        }
    }

    /// Map a raw engine code; anything but 1 or 2 is unknown
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(Self::Enter),
            2 => Some(Self::Exit),
            _ => None,
        }
    }

    /// Wire name used in broadcasts and webhook bodies
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Enter => "ENTER",
            Self::Exit => "EXIT",
        }
    }
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of transitions a fence is registered for (ENTER = 1, EXIT = 2)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransitionMask(u8);

impl TransitionMask {
    /// Entering only
    pub const ENTER: Self = Self(1);
    /// Exiting only
    pub const EXIT: Self = Self(2);
    /// Both directions
    pub const BOTH: Self = Self(3);

    /// Raw bits
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Whether the mask names at least one known transition and nothing else
    pub const fn is_valid(self) -> bool {
        self.0 != 0 && self.0 & !Self::BOTH.0 == 0
    }

    /// Whether `kind` is part of this mask
    pub const fn contains(self, kind: TransitionKind) -> bool {
        self.0 & kind.code() != 0
    }
}

impl From<TransitionKind> for TransitionMask {
    fn from(kind: TransitionKind) -> Self {
        Self(kind.code())
    }
}

/// Stored definition of one monitored region and its actions
///
/// Records are shared immutably once stored; the transition that fired on a
/// record travels next to it in a [`ResolvedFence`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FenceRecord {
    /// Caller-assigned identifier, unique within the store
    pub id: String,

    /// Center latitude in degrees
    pub latitude: f64,

    /// Center longitude in degrees
    pub longitude: f64,

    /// Radius in meters
    pub radius: u32,

    /// Transitions the fence is registered for
    pub transition_type: TransitionMask,

    /// Minimum dwell time; 0 selects the monitoring default
    #[serde(default, alias = "loiteringDelay")]
    pub loitering_delay_ms: u64,

    /// Alert handed verbatim to the notification facility
    #[serde(default, alias = "notification", skip_serializing_if = "Option::is_none")]
    pub local_alert: Option<serde_json::Value>,

    /// Callback receiving a POST on every transition
    #[serde(default, alias = "url", skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,

    /// Value for the webhook's `Authorization` header
    #[serde(default, alias = "authorization", skip_serializing_if = "Option::is_none")]
    pub webhook_auth_header: Option<String>,

    /// Transitions before this instant are ignored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,

    /// Transitions at or after this instant are ignored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
}

impl FenceRecord {
    /// Create a fence with no actions attached
    pub fn new(
        id: impl Into<String>,
        latitude: f64,
        longitude: f64,
        radius: u32,
        transition_type: TransitionMask,
    ) -> Self {
        Self {
            id: id.into(),
            latitude,
            longitude,
            radius,
            transition_type,
            loitering_delay_ms: 0,
            local_alert: None,
            webhook_url: None,
            webhook_auth_header: None,
            start_time: None,
            end_time: None,
        }
    }

    /// Check the registration invariants
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(Error::validation("fence id must not be empty"));
        }
        if self.radius == 0 {
            return Err(Error::validation(format!(
                "fence {}: radius must be positive",
                self.id
            )));
        }
        if !self.transition_type.is_valid() {
            return Err(Error::validation(format!(
                "fence {}: transition type {} is not a subset of ENTER|EXIT",
                self.id,
                self.transition_type.bits()
            )));
        }
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(Error::validation(format!(
                "fence {}: latitude {} out of range",
                self.id, self.latitude
            )));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(Error::validation(format!(
                "fence {}: longitude {} out of range",
                self.id, self.longitude
            )));
        }
        if let (Some(start), Some(end)) = (self.start_time, self.end_time) {
            if start >= end {
                return Err(Error::validation(format!(
                    "fence {}: start time must be before end time",
                    self.id
                )));
            }
        }
        Ok(())
    }

    /// Loitering delay to hand to the monitoring engine; never zero
    pub fn effective_loitering_delay(&self, default: Duration) -> Duration {
        match self.loitering_delay_ms {
            0 => default,
            ms => Duration::from_millis(ms),
        }
    }

    /// Whether `now` falls inside the fence's active window
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.start_time.map_or(true, |start| now >= start)
            && self.end_time.map_or(true, |end| now < end)
    }

    /// Webhook target, if one is set and non-empty
    pub fn webhook_url(&self) -> Option<&str> {
        self.webhook_url.as_deref().filter(|url| !url.is_empty())
    }

    /// Authorization header value, if one is set and non-empty
    pub fn webhook_auth_header(&self) -> Option<&str> {
        self.webhook_auth_header.as_deref().filter(|h| !h.is_empty())
    }
}

/// A stored record matched to the transition that fired on it
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFence {
    /// The stored definition, shared with the store
    pub record: Arc<FenceRecord>,
    /// What just happened
    pub transition: TransitionKind,
}

impl ResolvedFence {
    /// Pair a record with the transition that fired
    pub fn new(record: Arc<FenceRecord>, transition: TransitionKind) -> Self {
        Self { record, transition }
    }

    /// Identifier of the underlying fence
    pub fn id(&self) -> &str {
        &self.record.id
    }
}

/// Wire view of a resolved fence: the record with `transitionType` set to the
/// fired transition.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResolvedFenceWire<'a> {
    id: &'a str,
    latitude: f64,
    longitude: f64,
    radius: u32,
    transition_type: u8,
    loitering_delay_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    local_alert: Option<&'a serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    webhook_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    webhook_auth_header: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    end_time: Option<DateTime<Utc>>,
}

impl Serialize for ResolvedFence {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let record = &*self.record;
        ResolvedFenceWire {
            id: &record.id,
            latitude: record.latitude,
            longitude: record.longitude,
            radius: record.radius,
            transition_type: self.transition.code(),
            loitering_delay_ms: record.loitering_delay_ms,
            local_alert: record.local_alert.as_ref(),
            webhook_url: record.webhook_url.as_deref(),
            webhook_auth_header: record.webhook_auth_header.as_deref(),
            start_time: record.start_time,
            end_time: record.end_time,
        }
        .serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn create_test_fence(id: &str) -> FenceRecord {
        FenceRecord::new(id, 52.52, 13.405, 50, TransitionMask::BOTH)
    }

    #[test]
    fn test_transition_codes() {
        assert_eq!(TransitionKind::from_code(1), Some(TransitionKind::Enter));
        assert_eq!(TransitionKind::from_code(2), Some(TransitionKind::Exit));
        assert_eq!(TransitionKind::from_code(4), None);
        assert_eq!(TransitionKind::from_code(0), None);
        assert_eq!(TransitionKind::Exit.to_string(), "EXIT");
    }

    #[test]
    fn test_mask_validity() {
        assert!(TransitionMask::ENTER.is_valid());
        assert!(TransitionMask::BOTH.is_valid());
        assert!(!TransitionMask(0).is_valid());
        assert!(!TransitionMask(4).is_valid());
        assert!(TransitionMask::BOTH.contains(TransitionKind::Exit));
        assert!(!TransitionMask::ENTER.contains(TransitionKind::Exit));
    }

    #[test]
    fn test_validate() {
        assert!(create_test_fence("a").validate().is_ok());

        let mut fence = create_test_fence("");
        assert!(fence.validate().is_err());

        fence = create_test_fence("a");
        fence.radius = 0;
        assert!(fence.validate().is_err());

        fence = create_test_fence("a");
        fence.transition_type = TransitionMask(0);
        assert!(fence.validate().is_err());

        fence = create_test_fence("a");
        fence.latitude = 91.0;
        assert!(fence.validate().is_err());
    }

    #[test]
    fn test_active_window() {
        let now = Utc::now();
        let mut fence = create_test_fence("a");
        assert!(fence.is_active_at(now));

        fence.start_time = Some(now);
        fence.end_time = Some(now + chrono::Duration::hours(1));
        assert!(fence.is_active_at(now));
        assert!(!fence.is_active_at(now - chrono::Duration::seconds(1)));
        assert!(!fence.is_active_at(now + chrono::Duration::hours(1)));

        fence.end_time = Some(now);
        assert!(fence.validate().is_err());
    }

    #[test]
    fn test_zero_loitering_delay_uses_default() {
        let default = Duration::from_secs(3600);
        let mut fence = create_test_fence("a");

        assert_eq!(fence.effective_loitering_delay(default), default);

        fence.loitering_delay_ms = 30_000;
        assert_eq!(
            fence.effective_loitering_delay(default),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn test_empty_webhook_fields_are_absent() {
        let mut fence = create_test_fence("a");
        fence.webhook_url = Some(String::new());
        fence.webhook_auth_header = Some(String::new());

        assert_eq!(fence.webhook_url(), None);
        assert_eq!(fence.webhook_auth_header(), None);
    }

    #[test]
    fn test_deserialize_plugin_aliases() {
        let fence: FenceRecord = serde_json::from_value(json!({
            "id": "home",
            "latitude": 50.0,
            "longitude": 8.0,
            "radius": 100,
            "transitionType": 3,
            "loiteringDelay": 0,
            "notification": {"title": "Welcome home"},
            "url": "https://example.com/hook",
            "authorization": "Bearer token",
            "startTime": "2024-05-01T08:00:00.000Z"
        }))
        .unwrap();

        assert_eq!(fence.transition_type, TransitionMask::BOTH);
        assert_eq!(fence.local_alert, Some(json!({"title": "Welcome home"})));
        assert_eq!(fence.webhook_url(), Some("https://example.com/hook"));
        assert_eq!(fence.webhook_auth_header(), Some("Bearer token"));
        assert_eq!(
            fence.start_time.unwrap().to_rfc3339(),
            "2024-05-01T08:00:00+00:00"
        );
        assert!(fence.end_time.is_none());
    }

    #[test]
    fn test_resolved_fence_reports_fired_transition() {
        let record = Arc::new(create_test_fence("a"));
        let resolved = ResolvedFence::new(record.clone(), TransitionKind::Exit);

        let value = serde_json::to_value(&resolved).unwrap();

        assert_eq!(value["id"], "a");
        assert_eq!(value["transitionType"], 2);
        assert!(value.get("webhookUrl").is_none());
        // The stored record keeps its registration mask
        assert_eq!(record.transition_type, TransitionMask::BOTH);
    }
}
