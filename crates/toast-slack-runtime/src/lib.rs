//! Slack delivery for the toast relay.
//!
//! Formats captured notifications into channel messages and posts them through the
//! Slack Web API, classifying failures instead of propagating them.

pub mod delivery;
pub mod message_format;
pub mod slack_api_client;

pub use delivery::{DeliveryStatus, NotificationSink, SlackDelivery};
pub use message_format::{derive_app_name, format_message, title_case};
pub use slack_api_client::{SlackApiClient, SlackApiError, SlackPostedMessage};
