//! Direct reader for the platform notification database (`wpndatabase.db`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, ErrorCode, OpenFlags};
use toast_core::{identity_key, truncate_chars, Notification, SeenIdStore, UNKNOWN_APP_ID};
use tracing::{debug, warn};

use crate::acquisition::{AcquisitionStrategy, FetchOutcome};
use crate::payload::parse_toast_payload;

pub const STORE_ROW_LIMIT: usize = 100;
pub const DEFAULT_STORE_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const RECENT_TOASTS_QUERY: &str = "
    SELECT
        n.Id,
        n.Tag,
        n.[Group],
        n.Payload,
        n.ArrivalTime,
        h.PrimaryId AS AppId
    FROM Notification n
    LEFT JOIN NotificationHandler h ON n.HandlerId = h.RecordId
    WHERE n.Type = 'toast'
    ORDER BY n.ArrivalTime DESC
    LIMIT ?1
";

const TOAST_COUNT_QUERY: &str = "SELECT COUNT(*) FROM Notification WHERE Type = 'toast'";

/// `%LOCALAPPDATA%\Microsoft\Windows\Notifications\wpndatabase.db`, when the variable is set.
pub fn default_notification_db_path() -> Option<PathBuf> {
    let local_app_data = std::env::var_os("LOCALAPPDATA")?;
    Some(
        PathBuf::from(local_app_data)
            .join("Microsoft")
            .join("Windows")
            .join("Notifications")
            .join("wpndatabase.db"),
    )
}

#[derive(Debug, Clone)]
struct StoreRow {
    id: String,
    tag: String,
    group: String,
    payload: Option<String>,
    app_id: Option<String>,
}

enum StoreQueryError {
    Locked,
    Other(rusqlite::Error),
}

impl From<rusqlite::Error> for StoreQueryError {
    fn from(error: rusqlite::Error) -> Self {
        if is_lock_error(&error) {
            Self::Locked
        } else {
            Self::Other(error)
        }
    }
}

fn is_lock_error(error: &rusqlite::Error) -> bool {
    match error {
        rusqlite::Error::SqliteFailure(failure, message) => {
            matches!(
                failure.code,
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked
            ) || message
                .as_deref()
                .is_some_and(|text| text.to_ascii_lowercase().contains("database is locked"))
        }
        _ => false,
    }
}

fn value_to_string(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => String::new(),
        ValueRef::Integer(number) => number.to_string(),
        ValueRef::Real(number) => number.to_string(),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

fn value_to_optional_string(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        other => Some(value_to_string(other)),
    }
}

/// Reads recent toasts straight from the notification database, read-only.
#[derive(Debug, Clone)]
pub struct StructuredStoreReader {
    path: Option<PathBuf>,
    busy_timeout: Duration,
}

impl StructuredStoreReader {
    pub fn new(path: Option<PathBuf>, busy_timeout: Duration) -> Self {
        Self { path, busy_timeout }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Returns new, relayable notifications, newest first. Never panics or errors.
    pub fn read(&self, seen: &mut SeenIdStore) -> FetchOutcome {
        match self.load_rows() {
            Ok(rows) => FetchOutcome::from_batch(accept_rows(rows, seen)),
            Err(outcome) => outcome,
        }
    }

    /// Blocking half of [`Self::read`]: opens the database and pulls the raw rows.
    fn load_rows(&self) -> Result<Vec<StoreRow>, FetchOutcome> {
        let Some(path) = self.path.as_deref() else {
            return Err(FetchOutcome::Unavailable {
                reason: "notification database location is unknown".to_string(),
            });
        };
        if !path.is_file() {
            return Err(FetchOutcome::Unavailable {
                reason: format!("notification database {} does not exist", path.display()),
            });
        }

        self.query_rows(path).map_err(|error| match error {
            StoreQueryError::Locked => FetchOutcome::Unavailable {
                reason: "notification database is locked".to_string(),
            },
            StoreQueryError::Other(error) => {
                warn!(%error, path = %path.display(), "notification database query failed");
                FetchOutcome::Failed {
                    reason: error.to_string(),
                }
            }
        })
    }

    fn open(&self, path: &Path) -> Result<Connection, rusqlite::Error> {
        let connection = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        connection.busy_timeout(self.busy_timeout)?;
        Ok(connection)
    }

    fn query_rows(&self, path: &Path) -> Result<Vec<StoreRow>, StoreQueryError> {
        let connection = self.open(path)?;
        let mut statement = connection.prepare(RECENT_TOASTS_QUERY)?;
        let limit = i64::try_from(STORE_ROW_LIMIT).unwrap_or(i64::MAX);
        let rows = statement
            .query_map([limit], |row| {
                Ok(StoreRow {
                    id: value_to_string(row.get_ref(0)?),
                    tag: value_to_string(row.get_ref(1)?),
                    group: value_to_string(row.get_ref(2)?),
                    payload: value_to_optional_string(row.get_ref(3)?),
                    app_id: value_to_optional_string(row.get_ref(5)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        if rows.is_empty() {
            let toast_count = connection
                .query_row(TOAST_COUNT_QUERY, [], |row| row.get::<_, i64>(0))
                .unwrap_or_default();
            debug!(toast_count, "notification database returned no toast rows");
        }
        Ok(rows)
    }
}

fn accept_rows(rows: Vec<StoreRow>, seen: &mut SeenIdStore) -> Vec<Notification> {
    let mut accepted = Vec::new();
    for row in rows {
        let key = identity_key(&row.id, &row.group, &row.tag);
        if seen.contains(&key) {
            continue;
        }
        let Some(payload) = row.payload.as_deref() else {
            continue;
        };
        let Some((title, body)) = parse_toast_payload(payload).into_relayable() else {
            continue;
        };
        seen.mark_seen(&key);

        let app_id = row
            .app_id
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| UNKNOWN_APP_ID.to_string());
        debug!(title = %truncate_chars(&title, 50), %app_id, "captured notification from database");
        accepted.push(Notification::captured(key, title, body, app_id));
    }
    accepted
}

#[async_trait]
impl AcquisitionStrategy for StructuredStoreReader {
    fn name(&self) -> &'static str {
        "notification-db"
    }

    /// Runs the query on the blocking pool; a locked database can stall for the whole
    /// busy timeout.
    async fn try_fetch(&self, seen: &mut SeenIdStore) -> FetchOutcome {
        let reader = self.clone();
        match tokio::task::spawn_blocking(move || reader.load_rows()).await {
            Ok(Ok(rows)) => FetchOutcome::from_batch(accept_rows(rows, seen)),
            Ok(Err(outcome)) => outcome,
            Err(error) => FetchOutcome::Failed {
                reason: format!("notification database reader stopped: {error}"),
            },
        }
    }
}
