//! External shell invocation for history queries and parsing of its JSON output.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use thiserror::Error;
use tokio::process::Command;

use crate::history_scripts::{render_access_probe_script, HistoryStrategy};

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Captured result of one shell invocation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HistoryQueryOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl HistoryQueryOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

#[derive(Debug, Error)]
pub enum HistoryQueryError {
    #[error("failed to spawn history shell '{shell}': {source}")]
    Spawn {
        shell: String,
        #[source]
        source: std::io::Error,
    },
    #[error("history query timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("history shell i/o failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Capability boundary around the external history tool, mockable in tests.
#[async_trait]
pub trait HistoryQueryRunner: Send + Sync {
    async fn run_query(
        &self,
        strategy: &HistoryStrategy,
        timeout: Duration,
    ) -> Result<HistoryQueryOutput, HistoryQueryError>;

    /// Returns whether the history API is reachable at all. Never fails.
    async fn probe_history_access(&self, timeout: Duration) -> bool;
}

/// Runs history scripts through a PowerShell-compatible command interpreter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellHistoryRunner {
    shell: String,
}

impl ShellHistoryRunner {
    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }

    pub fn shell(&self) -> &str {
        &self.shell
    }

    async fn run_script(
        &self,
        script: &str,
        timeout: Duration,
    ) -> Result<HistoryQueryOutput, HistoryQueryError> {
        let mut command = Command::new(&self.shell);
        command.kill_on_drop(true);
        command.args(["-NoProfile", "-NonInteractive", "-Command", script]);
        command.stdin(Stdio::null());
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());
        #[cfg(windows)]
        command.creation_flags(CREATE_NO_WINDOW);

        let child = spawn_with_text_file_busy_retry(&mut command, &self.shell).await?;
        let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| HistoryQueryError::Timeout { timeout_ms })??;

        Ok(HistoryQueryOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

#[async_trait]
impl HistoryQueryRunner for ShellHistoryRunner {
    async fn run_query(
        &self,
        strategy: &HistoryStrategy,
        timeout: Duration,
    ) -> Result<HistoryQueryOutput, HistoryQueryError> {
        self.run_script(&strategy.render_script(), timeout).await
    }

    async fn probe_history_access(&self, timeout: Duration) -> bool {
        match self.run_script(&render_access_probe_script(), timeout).await {
            Ok(output) => output.stdout.trim() == "OK",
            Err(_) => false,
        }
    }
}

async fn spawn_with_text_file_busy_retry(
    command: &mut Command,
    shell: &str,
) -> Result<tokio::process::Child, HistoryQueryError> {
    const MAX_TEXT_FILE_BUSY_RETRIES: u32 = 5;
    const TEXT_FILE_BUSY_ERRNO: i32 = 26;
    let mut attempt = 0;
    loop {
        match command.spawn() {
            Ok(child) => return Ok(child),
            Err(error)
                if error.raw_os_error() == Some(TEXT_FILE_BUSY_ERRNO)
                    && attempt < MAX_TEXT_FILE_BUSY_RETRIES =>
            {
                attempt += 1;
                tokio::time::sleep(Duration::from_millis(25)).await;
            }
            Err(source) => {
                return Err(HistoryQueryError::Spawn {
                    shell: shell.to_string(),
                    source,
                })
            }
        }
    }
}

/// One toast as serialized by the history scripts.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HistoryEntry {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub group: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub tag: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub app_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub body: Option<String>,
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => None,
        Value::String(text) => Some(text),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Number(number) => Some(number.to_string()),
        other => Some(other.to_string()),
    })
}

/// Parses script stdout into entries.
///
/// Blank output and `[]` are empty. A lone object is treated as a one-element array.
pub fn parse_history_output(stdout: &str) -> Result<Vec<HistoryEntry>, serde_json::Error> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() || trimmed == "[]" {
        return Ok(Vec::new());
    }
    let value = serde_json::from_str::<Value>(trimmed)?;
    match value {
        Value::Array(_) => serde_json::from_value::<Vec<HistoryEntry>>(value),
        other => serde_json::from_value::<HistoryEntry>(other).map(|entry| vec![entry]),
    }
}
