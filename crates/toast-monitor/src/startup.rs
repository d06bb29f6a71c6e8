use std::sync::Arc;

use anyhow::{bail, Context, Result};
use toast_core::SeenIdStore;
use toast_slack_runtime::{SlackApiClient, SlackDelivery};
use toast_sources::{
    default_notification_db_path, AcquisitionStrategy, HistoryQueryRunner, HistoryStrategy,
    HistoryToolStrategy, NotificationAcquirer, ShellHistoryRunner, StructuredStoreReader,
};
use tracing::{debug, info, warn};

use crate::cli_args::Cli;
use crate::context_resolver::resolve_relay_context;
use crate::monitor_loop::{MonitorConfig, RelayMonitor};

/// Ordered acquisition: database first, then global history, then per-application history.
fn build_acquirer(cli: &Cli, runner: &Arc<dyn HistoryQueryRunner>) -> NotificationAcquirer {
    let store_path = cli
        .notification_db
        .clone()
        .or_else(default_notification_db_path);
    let store = StructuredStoreReader::new(store_path, cli.store_busy_timeout());
    match store.path() {
        Some(path) => debug!(path = %path.display(), "notification database location"),
        None => debug!("notification database location is unknown"),
    }
    let strategies: Vec<Box<dyn AcquisitionStrategy>> = vec![
        Box::new(store),
        Box::new(HistoryToolStrategy::new(
            HistoryStrategy::GlobalHistory,
            Arc::clone(runner),
            cli.history_timeout(),
        )),
        Box::new(HistoryToolStrategy::new(
            HistoryStrategy::per_application_with(&cli.history_app_id),
            Arc::clone(runner),
            cli.history_timeout(),
        )),
    ];
    NotificationAcquirer::new(strategies)
}

fn open_seen_store(cli: &Cli) -> Result<SeenIdStore> {
    match cli.seen_state_file.clone() {
        Some(path) => SeenIdStore::load(path, cli.seen_capacity),
        None => Ok(SeenIdStore::in_memory(cli.seen_capacity)),
    }
}

pub fn build_monitor(cli: &Cli) -> Result<RelayMonitor> {
    if cli.slack_bot_token.trim().is_empty() {
        bail!("SLACK_BOT_TOKEN is empty");
    }
    if cli.slack_channel.trim().is_empty() {
        bail!("SLACK_CHANNEL is empty");
    }

    let client = SlackApiClient::new(
        cli.slack_api_base.clone(),
        cli.slack_bot_token.clone(),
        cli.slack_request_timeout_ms,
        cli.slack_retry_max_attempts,
        cli.slack_retry_base_delay_ms,
    )?;
    let runner: Arc<dyn HistoryQueryRunner> =
        Arc::new(ShellHistoryRunner::new(cli.history_shell.clone()));
    let acquirer = build_acquirer(cli, &runner);
    let seen = open_seen_store(cli).context("failed to open seen identity store")?;
    if let Some(path) = seen.path() {
        info!(
            path = %path.display(),
            identities = seen.len(),
            "loaded seen identity state"
        );
    }
    info!(strategies = ?acquirer.strategy_names(), "configured acquisition order");

    let context = resolve_relay_context(cli.machine_name.as_deref(), cli.region.clone());
    let config = MonitorConfig {
        channel: cli.slack_channel.trim().to_string(),
        poll_interval: cli.poll_interval(),
        heartbeat_every: cli.heartbeat_every,
        access_check_timeout: cli.access_check_timeout(),
        skip_access_check: cli.skip_access_check,
    };
    Ok(RelayMonitor::new(
        config,
        context,
        acquirer,
        Arc::new(SlackDelivery::new(client)),
        seen,
    )
    .with_history_runner(runner))
}

/// Builds the monitor and runs it until ctrl+c.
pub async fn run_relay(cli: Cli) -> Result<()> {
    let mut monitor = build_monitor(&cli)?;
    monitor
        .run_until(async {
            if let Err(error) = tokio::signal::ctrl_c().await {
                warn!(%error, "failed to listen for ctrl+c; running until killed");
                std::future::pending::<()>().await;
            }
        })
        .await
}
