//! Acquisition strategy backed by the external history tool.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use toast_core::{
    identity_key, truncate_chars, Notification, SeenIdStore, NOTIFICATION_TITLE_PLACEHOLDER,
    UNKNOWN_APP_ID,
};
use tracing::{debug, warn};

use crate::acquisition::{AcquisitionStrategy, FetchOutcome};
use crate::history_runner::{
    parse_history_output, HistoryEntry, HistoryQueryError, HistoryQueryRunner,
};
use crate::history_scripts::HistoryStrategy;

pub const DEFAULT_HISTORY_TIMEOUT: Duration = Duration::from_secs(10);

/// Diagnostics the shell prints when the history feature simply is not there.
const FEATURE_ABSENT_MARKERS: &[&str] = &["Element not found", "0x80070490"];

fn is_feature_absent_diagnostic(text: &str) -> bool {
    FEATURE_ABSENT_MARKERS
        .iter()
        .any(|marker| text.contains(marker))
}

pub struct HistoryToolStrategy {
    strategy: HistoryStrategy,
    runner: Arc<dyn HistoryQueryRunner>,
    timeout: Duration,
}

impl HistoryToolStrategy {
    pub fn new(
        strategy: HistoryStrategy,
        runner: Arc<dyn HistoryQueryRunner>,
        timeout: Duration,
    ) -> Self {
        Self {
            strategy,
            runner,
            timeout,
        }
    }

    fn accept_entries(
        &self,
        entries: Vec<HistoryEntry>,
        seen: &mut SeenIdStore,
    ) -> Vec<Notification> {
        let mut accepted = Vec::new();
        for entry in entries {
            let key = identity_key(
                entry.id.as_deref().unwrap_or_default(),
                entry.group.as_deref().unwrap_or_default(),
                entry.tag.as_deref().unwrap_or_default(),
            );
            if seen.contains(&key) {
                continue;
            }
            seen.mark_seen(&key);

            let title = entry
                .title
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| NOTIFICATION_TITLE_PLACEHOLDER.to_string());
            let app_id = entry
                .app_id
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN_APP_ID.to_string());
            debug!(
                strategy = self.strategy.name(),
                title = %truncate_chars(&title, 50),
                %app_id,
                "captured notification from history"
            );
            accepted.push(Notification::captured(
                key,
                title,
                entry.body.unwrap_or_default(),
                app_id,
            ));
        }
        accepted
    }
}

#[async_trait]
impl AcquisitionStrategy for HistoryToolStrategy {
    fn name(&self) -> &'static str {
        self.strategy.name()
    }

    async fn try_fetch(&self, seen: &mut SeenIdStore) -> FetchOutcome {
        let output = match self.runner.run_query(&self.strategy, self.timeout).await {
            Ok(output) => output,
            Err(error @ HistoryQueryError::Timeout { .. }) => {
                warn!(strategy = self.strategy.name(), "history query timed out");
                return FetchOutcome::Failed {
                    reason: error.to_string(),
                };
            }
            Err(error) => {
                return FetchOutcome::Unavailable {
                    reason: error.to_string(),
                };
            }
        };

        let stderr = output.stderr.trim();
        let feature_absent = is_feature_absent_diagnostic(stderr);
        if !stderr.is_empty() && !feature_absent {
            warn!(
                strategy = self.strategy.name(),
                diagnostic = %truncate_chars(stderr, 100),
                "history shell reported a warning"
            );
        }

        if !output.success() {
            if feature_absent {
                return FetchOutcome::Unavailable {
                    reason: "notification history is not supported".to_string(),
                };
            }
            let status = output
                .exit_code
                .map(|code| code.to_string())
                .unwrap_or_else(|| "signal".to_string());
            return FetchOutcome::Failed {
                reason: format!("history shell exited with status {status}"),
            };
        }

        let entries = match parse_history_output(&output.stdout) {
            Ok(entries) => entries,
            Err(error) => {
                let stdout = output.stdout.trim();
                if !stdout.is_empty() {
                    warn!(
                        strategy = self.strategy.name(),
                        %error,
                        output = %truncate_chars(stdout, 200),
                        "failed to parse history output"
                    );
                }
                return FetchOutcome::Failed {
                    reason: format!("unparsable history output: {error}"),
                };
            }
        };

        FetchOutcome::from_batch(self.accept_entries(entries, seen))
    }
}
