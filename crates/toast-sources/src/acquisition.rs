//! Ordered acquisition strategies and the orchestrator that walks them.

use async_trait::async_trait;
use toast_core::{Notification, SeenIdStore};
use tracing::debug;

/// Result of one strategy attempt.
///
/// `Empty` means the source answered with nothing new. `Unavailable` means the source
/// could not be consulted at all (missing store, locked store, unsupported history).
/// `Failed` means the source was consulted and returned something unusable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Notifications(Vec<Notification>),
    Empty,
    Unavailable { reason: String },
    Failed { reason: String },
}

impl FetchOutcome {
    pub fn from_batch(notifications: Vec<Notification>) -> Self {
        if notifications.is_empty() {
            Self::Empty
        } else {
            Self::Notifications(notifications)
        }
    }

    pub fn status_label(&self) -> &'static str {
        match self {
            Self::Notifications(_) => "notifications",
            Self::Empty => "empty",
            Self::Unavailable { .. } => "unavailable",
            Self::Failed { .. } => "failed",
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Unavailable { reason } | Self::Failed { reason } => Some(reason.as_str()),
            _ => None,
        }
    }
}

/// A source of new notifications.
///
/// Implementations must consult `seen` before accepting a row and mark the identity
/// as seen when they accept it, so nothing is emitted twice.
#[async_trait]
pub trait AcquisitionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn try_fetch(&self, seen: &mut SeenIdStore) -> FetchOutcome;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyAttempt {
    pub strategy: &'static str,
    pub status: &'static str,
    pub reason: Option<String>,
}

#[derive(Debug, Default)]
pub struct AcquisitionReport {
    pub notifications: Vec<Notification>,
    /// Strategy that produced `notifications`, if any did.
    pub source: Option<&'static str>,
    pub attempts: Vec<StrategyAttempt>,
}

/// Tries each strategy in order and stops at the first one that yields notifications.
pub struct NotificationAcquirer {
    strategies: Vec<Box<dyn AcquisitionStrategy>>,
}

impl NotificationAcquirer {
    pub fn new(strategies: Vec<Box<dyn AcquisitionStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|strategy| strategy.name()).collect()
    }

    pub async fn acquire(&self, seen: &mut SeenIdStore) -> AcquisitionReport {
        let mut report = AcquisitionReport::default();
        for strategy in &self.strategies {
            let outcome = strategy.try_fetch(seen).await;
            report.attempts.push(StrategyAttempt {
                strategy: strategy.name(),
                status: outcome.status_label(),
                reason: outcome.reason().map(str::to_string),
            });
            match outcome {
                FetchOutcome::Notifications(notifications) => {
                    report.notifications = notifications;
                    report.source = Some(strategy.name());
                    return report;
                }
                FetchOutcome::Empty => {}
                FetchOutcome::Unavailable { reason } | FetchOutcome::Failed { reason } => {
                    debug!(
                        strategy = strategy.name(),
                        %reason,
                        "acquisition strategy yielded nothing"
                    );
                }
            }
        }
        report
    }
}
