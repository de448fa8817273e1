//! Notification payload shared by the browser and the native bridge.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Highest priority a local notification can carry.
pub const MAX_PRIORITY: i8 = 5;

/// When a scheduled notification fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    /// Firing time.
    pub at: DateTime<Utc>,
}

/// A notification as handed to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Notification identifier (32-bit on the native side).
    pub id: i32,
    /// Title line.
    pub title: String,
    /// Body text.
    pub body: String,
    /// Icon path shown next to the text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Replaces an earlier notification with the same tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// Firing time; shown immediately when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<Schedule>,
    /// Sound resource, `"default"` for the system sound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sound: Option<String>,
    /// Priority up to [`MAX_PRIORITY`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i8>,
    /// Sticky notification the user cannot swipe away.
    #[serde(default)]
    pub ongoing: bool,
    /// Dismiss the notification when the user taps it.
    #[serde(default)]
    pub auto_cancel: bool,
    /// Free-form payload passed back when the notification is tapped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

impl Notification {
    /// Creates a plain notification.
    #[must_use]
    pub fn new(id: i32, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            body: body.into(),
            icon: None,
            tag: None,
            schedule: None,
            sound: None,
            priority: None,
            ongoing: false,
            auto_cancel: false,
            extra: None,
        }
    }

    /// Sets the icon.
    #[must_use]
    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    /// Sets the tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Schedules the notification `delay` after `now`.
    #[must_use]
    pub fn fire_after(mut self, now: DateTime<Utc>, delay: Duration) -> Self {
        let delay = chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
        self.schedule = Some(Schedule { at: now + delay });
        self
    }

    /// Marks the notification as an alarm: default sound, maximum priority,
    /// not ongoing, cancelled on tap.
    #[must_use]
    pub fn alarm(mut self) -> Self {
        self.sound = Some("default".to_string());
        self.priority = Some(MAX_PRIORITY);
        self.ongoing = false;
        self.auto_cancel = true;
        self.extra = Some(serde_json::json!({ "data": "alarm" }));
        self
    }
}

/// Derives a 32-bit notification id from a timestamp.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn id_from_time(now: DateTime<Utc>) -> i32 {
    now.timestamp_millis().rem_euclid(i64::from(i32::MAX)) as i32
}
