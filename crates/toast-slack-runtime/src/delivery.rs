//! Delivery of formatted messages with classified, non-propagating failures.

use async_trait::async_trait;
use tracing::{error, warn};

use crate::slack_api_client::{SlackApiClient, SlackApiError};

const CHANNEL_NOT_FOUND: &str = "channel_not_found";

/// Outcome of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryStatus {
    Delivered,
    ChannelNotFound,
    ApiError { code: String },
    TransportError { message: String },
}

impl DeliveryStatus {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Delivered => "delivered",
            Self::ChannelNotFound => "channel_not_found",
            Self::ApiError { .. } => "api_error",
            Self::TransportError { .. } => "transport_error",
        }
    }
}

/// Destination for relay messages. Implementations report failure through the
/// returned status and never panic.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, channel: &str, message: &str) -> DeliveryStatus;
}

pub struct SlackDelivery {
    client: SlackApiClient,
}

impl SlackDelivery {
    pub fn new(client: SlackApiClient) -> Self {
        Self { client }
    }
}

fn classify_error(channel: &str, failure: SlackApiError) -> DeliveryStatus {
    match failure {
        SlackApiError::Api { code, .. } if code == CHANNEL_NOT_FOUND => {
            error!(
                channel,
                "slack channel not found; check that the channel id or name is correct, \
                 that the bot is invited to the channel, or use a channel name with a # \
                 prefix (e.g. #general)"
            );
            DeliveryStatus::ChannelNotFound
        }
        SlackApiError::Api { code, .. } => {
            warn!(channel, %code, "slack api error");
            DeliveryStatus::ApiError { code }
        }
        other => {
            let message = other.to_string();
            warn!(channel, error = %message, "error sending to slack");
            DeliveryStatus::TransportError { message }
        }
    }
}

#[async_trait]
impl NotificationSink for SlackDelivery {
    async fn deliver(&self, channel: &str, message: &str) -> DeliveryStatus {
        match self.client.post_message(channel, message).await {
            Ok(_) => DeliveryStatus::Delivered,
            Err(failure) => classify_error(channel, failure),
        }
    }
}
