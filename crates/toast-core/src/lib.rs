//! Foundational types and utilities shared across toast relay crates.
//!
//! Provides the captured `Notification` record, the identity triple, the
//! relay context, the bounded seen-identity store and time-zone labels.

pub mod notification;
pub mod relay_context;
pub mod seen_store;
pub mod time_utils;

pub use notification::{
    identity_key, truncate_chars, Notification, NOTIFICATION_TITLE_PLACEHOLDER, UNKNOWN_APP_ID,
};
pub use relay_context::RelayContext;
pub use seen_store::{SeenIdStore, DEFAULT_SEEN_CAPACITY};
pub use time_utils::{local_timezone_offset, timezone_offset_label};
