use std::time::Duration;

use toast_sources::HistoryQueryRunner;
use tracing::{info, warn};

const HISTORY_ACCESS_REMEDIATION: &str = "\
cannot access notification history. This usually means:
  1. Notification history is empty (no notifications stored yet)
  2. The notification history feature is disabled
  3. Windows settings need to be configured
To fix this:
  1. Open Windows Settings (Win + I)
  2. Go to System > Notifications
  3. Make sure notifications are enabled
  4. Enable 'Get notifications from apps and other senders'
The relay keeps running and captures notifications once they appear in history.
Trigger a test notification (like a Slack message) to verify.";

/// One-shot advisory probe of the notification history API. Never fails.
pub async fn check_history_access(runner: &dyn HistoryQueryRunner, timeout: Duration) -> bool {
    info!("checking notification history access");
    let accessible = runner.probe_history_access(timeout).await;
    if accessible {
        info!("notification history is accessible");
    } else {
        warn!("{HISTORY_ACCESS_REMEDIATION}");
    }
    accessible
}
