//! Captured notification record and identity helpers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Title used when a notification carries no title of its own.
pub const NOTIFICATION_TITLE_PLACEHOLDER: &str = "Notification";
/// App id used when the originating application cannot be resolved.
pub const UNKNOWN_APP_ID: &str = "Unknown";

/// A desktop notification captured on this host and queued for relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Identity key built from the raw id, group, and tag.
    pub id: String,
    pub title: String,
    pub body: String,
    /// When the relay captured the notification, not when the OS received it.
    pub timestamp: DateTime<Utc>,
    pub app_id: String,
}

impl Notification {
    /// Builds a record stamped with the current capture time.
    pub fn captured(id: String, title: String, body: String, app_id: String) -> Self {
        Self {
            id,
            title,
            body,
            timestamp: Utc::now(),
            app_id,
        }
    }

    pub fn has_placeholder_title(&self) -> bool {
        self.title == NOTIFICATION_TITLE_PLACEHOLDER
    }
}

/// Returns the identity key `"{id}_{group}_{tag}"` for one notification.
///
/// Several toasts from the same app can share a raw id, so group and tag are part of the key.
pub fn identity_key(id: &str, group: &str, tag: &str) -> String {
    format!("{id}_{group}_{tag}")
}

/// Returns at most `max_chars` characters of `value`, cut on a char boundary.
pub fn truncate_chars(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}
