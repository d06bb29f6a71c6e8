//! Poll, deliver, sleep. Runs until the injected shutdown future resolves or a cycle
//! hits a fatal error.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use toast_core::{truncate_chars, RelayContext, SeenIdStore};
use toast_slack_runtime::{format_message, NotificationSink};
use toast_sources::{HistoryQueryRunner, NotificationAcquirer};
use tracing::{debug, error, info, warn};

use crate::access_check::check_history_access;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Starting,
    Running,
    Stopping,
    Stopped,
}

/// Counts empty polls; a heartbeat is due on every positive multiple of `every`.
///
/// Polls that delivered something do not touch the count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdleHeartbeat {
    every: u64,
    empty_cycles: u64,
}

impl IdleHeartbeat {
    pub fn new(every: u64) -> Self {
        Self {
            every: every.max(1),
            empty_cycles: 0,
        }
    }

    /// Records one empty poll and returns whether a heartbeat is due.
    pub fn record_empty(&mut self) -> bool {
        self.empty_cycles = self.empty_cycles.saturating_add(1);
        self.empty_cycles % self.every == 0
    }

    pub fn empty_cycles(&self) -> u64 {
        self.empty_cycles
    }
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub channel: String,
    pub poll_interval: Duration,
    pub heartbeat_every: u64,
    pub access_check_timeout: Duration,
    pub skip_access_check: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub acquired: usize,
    pub delivered: usize,
    pub failed: usize,
    pub source: Option<&'static str>,
    pub heartbeat: bool,
}

pub struct RelayMonitor {
    config: MonitorConfig,
    context: RelayContext,
    acquirer: NotificationAcquirer,
    sink: Arc<dyn NotificationSink>,
    history_runner: Option<Arc<dyn HistoryQueryRunner>>,
    seen: SeenIdStore,
    heartbeat: IdleHeartbeat,
    state: MonitorState,
}

impl RelayMonitor {
    pub fn new(
        config: MonitorConfig,
        context: RelayContext,
        acquirer: NotificationAcquirer,
        sink: Arc<dyn NotificationSink>,
        seen: SeenIdStore,
    ) -> Self {
        let heartbeat = IdleHeartbeat::new(config.heartbeat_every);
        Self {
            config,
            context,
            acquirer,
            sink,
            history_runner: None,
            seen,
            heartbeat,
            state: MonitorState::Starting,
        }
    }

    /// Runner used for the startup access check.
    pub fn with_history_runner(mut self, runner: Arc<dyn HistoryQueryRunner>) -> Self {
        self.history_runner = Some(runner);
        self
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn context(&self) -> &RelayContext {
        &self.context
    }

    pub fn seen(&self) -> &SeenIdStore {
        &self.seen
    }

    pub fn heartbeat(&self) -> &IdleHeartbeat {
        &self.heartbeat
    }

    /// One acquire/deliver pass. Only persisting seen identities can fail.
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        let acquisition = self.acquirer.acquire(&mut self.seen).await;
        let mut report = CycleReport {
            acquired: acquisition.notifications.len(),
            source: acquisition.source,
            ..CycleReport::default()
        };
        for attempt in &acquisition.attempts {
            debug!(
                strategy = attempt.strategy,
                status = attempt.status,
                reason = attempt.reason.as_deref().unwrap_or_default(),
                "acquisition attempt"
            );
        }

        for notification in &acquisition.notifications {
            let message = format_message(notification, &self.context);
            let status = self.sink.deliver(&self.config.channel, &message).await;
            if status.is_delivered() {
                report.delivered += 1;
                info!(
                    title = %truncate_chars(&notification.title, 50),
                    "sent notification to slack"
                );
            } else {
                report.failed += 1;
                warn!(
                    id = %notification.id,
                    status = status.label(),
                    "notification was not delivered"
                );
            }
        }

        if report.acquired > 0 {
            info!(
                failed = report.failed,
                source = report.source.unwrap_or_default(),
                "processed {} new notification(s)",
                report.acquired
            );
        } else if self.heartbeat.record_empty() {
            report.heartbeat = true;
            info!(
                empty_polls = self.heartbeat.empty_cycles(),
                "checking... (no new notifications found)"
            );
        }

        if self
            .seen
            .save_if_dirty()
            .context("failed to persist seen notification identities")?
        {
            debug!(identities = self.seen.len(), "persisted seen identities");
        }
        Ok(report)
    }

    /// Runs cycles until `shutdown` resolves (returns `Ok`) or a cycle fails (returns the
    /// error).
    ///
    /// `shutdown` is polled once before any work so listeners it owns (ctrl+c) are installed
    /// from the start. A request that arrives during the access check ends it early; one that
    /// arrives mid-cycle lets the cycle finish and is honored before the next sleep.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        self.state = MonitorState::Starting;
        let already_requested = tokio::select! {
            biased;
            _ = &mut shutdown => true,
            _ = std::future::ready(()) => false,
        };
        if already_requested {
            self.stop();
            return Ok(());
        }
        info!(
            interval_secs = self.config.poll_interval.as_secs_f64(),
            channel = %self.config.channel,
            machine = %self.context.machine_name,
            region = %self.context.region,
            timezone = %self.context.timezone_offset,
            "starting notification monitor"
        );

        if !self.config.skip_access_check {
            if let Some(runner) = self.history_runner.clone() {
                let timeout = self.config.access_check_timeout;
                tokio::select! {
                    _ = &mut shutdown => {
                        self.stop();
                        return Ok(());
                    }
                    _ = check_history_access(runner.as_ref(), timeout) => {}
                }
            }
        }
        self.state = MonitorState::Running;
        info!("press ctrl+c to stop");

        loop {
            if let Err(cycle_error) = self.run_cycle().await {
                error!(error = %format!("{cycle_error:#}"), "error in monitor loop");
                self.state = MonitorState::Stopped;
                return Err(cycle_error);
            }

            tokio::select! {
                _ = &mut shutdown => {
                    self.stop();
                    return Ok(());
                }
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }
    }

    fn stop(&mut self) {
        self.state = MonitorState::Stopping;
        info!("stopping monitor");
        self.state = MonitorState::Stopped;
    }
}
