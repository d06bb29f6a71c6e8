use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use toast_core::DEFAULT_SEEN_CAPACITY;
use toast_sources::{DEFAULT_HISTORY_TIMEOUT, DEFAULT_STORE_BUSY_TIMEOUT};

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_positive_usize(value: &str) -> Result<usize, String> {
    let parsed = value
        .parse::<usize>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

#[derive(Debug, Parser)]
#[command(
    name = "toast-relay",
    about = "Relays desktop toast notifications to a Slack channel",
    version
)]
pub struct Cli {
    #[arg(
        long = "slack-bot-token",
        env = "SLACK_BOT_TOKEN",
        hide_env_values = true,
        help = "Slack bot token for the Web API (xoxb-...)"
    )]
    pub slack_bot_token: String,

    #[arg(
        long = "slack-channel",
        env = "SLACK_CHANNEL",
        default_value = "#notifications",
        help = "Destination channel id or #name"
    )]
    pub slack_channel: String,

    #[arg(
        long = "machine-name",
        env = "MACHINE_NAME",
        help = "Machine label used in message headers (defaults to the host name)"
    )]
    pub machine_name: Option<String>,

    #[arg(
        long,
        env = "REGION",
        help = "Region label override; skips timezone and locale detection"
    )]
    pub region: Option<String>,

    #[arg(
        long = "poll-interval-secs",
        env = "TOAST_RELAY_POLL_INTERVAL_SECS",
        default_value_t = 5,
        value_parser = parse_positive_u64,
        help = "Seconds to sleep between polls"
    )]
    pub poll_interval_secs: u64,

    #[arg(
        long = "heartbeat-every",
        env = "TOAST_RELAY_HEARTBEAT_EVERY",
        default_value_t = 12,
        value_parser = parse_positive_u64,
        help = "Emit an idle heartbeat after this many empty polls"
    )]
    pub heartbeat_every: u64,

    #[arg(
        long = "slack-api-base",
        env = "TOAST_RELAY_SLACK_API_BASE",
        default_value = "https://slack.com/api",
        help = "Slack Web API base URL"
    )]
    pub slack_api_base: String,

    #[arg(
        long = "slack-request-timeout-ms",
        env = "TOAST_RELAY_SLACK_REQUEST_TIMEOUT_MS",
        default_value_t = 10_000,
        value_parser = parse_positive_u64,
        help = "Timeout for a single Slack API request"
    )]
    pub slack_request_timeout_ms: u64,

    #[arg(
        long = "slack-retry-max-attempts",
        env = "TOAST_RELAY_SLACK_RETRY_MAX_ATTEMPTS",
        default_value_t = 1,
        value_parser = parse_positive_usize,
        help = "Maximum attempts for retryable Slack failures (429/5xx/transport); 1 disables retries"
    )]
    pub slack_retry_max_attempts: usize,

    #[arg(
        long = "slack-retry-base-delay-ms",
        env = "TOAST_RELAY_SLACK_RETRY_BASE_DELAY_MS",
        default_value_t = 500,
        help = "Base backoff delay in milliseconds for Slack retries"
    )]
    pub slack_retry_base_delay_ms: u64,

    #[arg(
        long = "history-shell",
        env = "TOAST_RELAY_HISTORY_SHELL",
        default_value = "powershell",
        help = "Command interpreter used for notification history queries"
    )]
    pub history_shell: String,

    #[arg(
        long = "history-timeout-ms",
        env = "TOAST_RELAY_HISTORY_TIMEOUT_MS",
        default_value_t = DEFAULT_HISTORY_TIMEOUT.as_millis() as u64,
        value_parser = parse_positive_u64,
        help = "Timeout for each notification history query"
    )]
    pub history_timeout_ms: u64,

    #[arg(
        long = "access-check-timeout-ms",
        env = "TOAST_RELAY_ACCESS_CHECK_TIMEOUT_MS",
        default_value_t = 5_000,
        value_parser = parse_positive_u64,
        help = "Timeout for the startup history access check"
    )]
    pub access_check_timeout_ms: u64,

    #[arg(
        long = "history-app-id",
        env = "TOAST_RELAY_HISTORY_APP_IDS",
        value_delimiter = ',',
        help = "Extra application ids queried by the per-application history fallback"
    )]
    pub history_app_id: Vec<String>,

    #[arg(
        long = "notification-db",
        env = "TOAST_RELAY_NOTIFICATION_DB",
        help = "Notification database path (defaults to the per-user wpndatabase.db)"
    )]
    pub notification_db: Option<PathBuf>,

    #[arg(
        long = "store-busy-timeout-ms",
        env = "TOAST_RELAY_STORE_BUSY_TIMEOUT_MS",
        default_value_t = DEFAULT_STORE_BUSY_TIMEOUT.as_millis() as u64,
        help = "How long a database read waits on a locked store"
    )]
    pub store_busy_timeout_ms: u64,

    #[arg(
        long = "seen-capacity",
        env = "TOAST_RELAY_SEEN_CAPACITY",
        default_value_t = DEFAULT_SEEN_CAPACITY,
        value_parser = parse_positive_usize,
        help = "Maximum notification identities remembered for duplicate suppression"
    )]
    pub seen_capacity: usize,

    #[arg(
        long = "seen-state-file",
        env = "TOAST_RELAY_SEEN_STATE_FILE",
        help = "Optional JSON file persisting seen identities across restarts"
    )]
    pub seen_state_file: Option<PathBuf>,

    #[arg(
        long = "skip-access-check",
        env = "TOAST_RELAY_SKIP_ACCESS_CHECK",
        default_value_t = false,
        help = "Skip the startup notification history access check"
    )]
    pub skip_access_check: bool,
}

impl Cli {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn history_timeout(&self) -> Duration {
        Duration::from_millis(self.history_timeout_ms)
    }

    pub fn access_check_timeout(&self) -> Duration {
        Duration::from_millis(self.access_check_timeout_ms)
    }

    pub fn store_busy_timeout(&self) -> Duration {
        Duration::from_millis(self.store_busy_timeout_ms)
    }
}
