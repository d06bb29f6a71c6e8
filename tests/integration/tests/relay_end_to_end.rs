use std::path::Path;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;

use async_trait::async_trait;
use httpmock::prelude::*;
use rusqlite::{params, Connection};
use serde_json::json;
use tempfile::tempdir;
use toast_core::{RelayContext, SeenIdStore};
use toast_monitor::{MonitorConfig, MonitorState, RelayMonitor};
use toast_slack_runtime::{SlackApiClient, SlackDelivery};
use toast_sources::{
    AcquisitionStrategy, HistoryQueryError, HistoryQueryOutput, HistoryQueryRunner,
    HistoryStrategy, HistoryToolStrategy, NotificationAcquirer, StructuredStoreReader,
};

struct ScriptedHistory {
    global_stdout: String,
    per_app_stdout: String,
    queries: AtomicUsize,
}

impl ScriptedHistory {
    fn new(global_stdout: &str, per_app_stdout: &str) -> Self {
        Self {
            global_stdout: global_stdout.to_string(),
            per_app_stdout: per_app_stdout.to_string(),
            queries: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl HistoryQueryRunner for ScriptedHistory {
    async fn run_query(
        &self,
        strategy: &HistoryStrategy,
        _timeout: Duration,
    ) -> Result<HistoryQueryOutput, HistoryQueryError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        let stdout = match strategy {
            HistoryStrategy::GlobalHistory => self.global_stdout.clone(),
            HistoryStrategy::PerApplication { .. } => self.per_app_stdout.clone(),
        };
        Ok(HistoryQueryOutput {
            exit_code: Some(0),
            stdout,
            stderr: String::new(),
        })
    }

    async fn probe_history_access(&self, _timeout: Duration) -> bool {
        true
    }
}

fn create_store(path: &Path) -> Connection {
    let connection = Connection::open(path).expect("open store");
    connection
        .execute_batch(
            "
            CREATE TABLE NotificationHandler (RecordId INTEGER PRIMARY KEY, PrimaryId TEXT);
            CREATE TABLE Notification (
                Id INTEGER, HandlerId INTEGER, Type TEXT, Tag TEXT, [Group] TEXT,
                Payload BLOB, ArrivalTime INTEGER
            );
            INSERT INTO NotificationHandler (RecordId, PrimaryId) VALUES (1, 'com.squirrel.slack.slack');
            ",
        )
        .expect("schema");
    connection
}

fn insert_toast(connection: &Connection, id: i64, payload: &str, arrival: i64) {
    connection
        .execute(
            "INSERT INTO Notification (Id, HandlerId, Type, Tag, [Group], Payload, ArrivalTime)
             VALUES (?1, 1, 'toast', '', 'chat', ?2, ?3)",
            params![id, payload.as_bytes(), arrival],
        )
        .expect("insert toast");
}

fn relay(
    store_path: &Path,
    history: Arc<ScriptedHistory>,
    api_base: String,
    poll_interval: Duration,
) -> RelayMonitor {
    let runner: Arc<dyn HistoryQueryRunner> = history;
    let strategies: Vec<Box<dyn AcquisitionStrategy>> = vec![
        Box::new(StructuredStoreReader::new(
            Some(store_path.to_path_buf()),
            Duration::from_millis(0),
        )),
        Box::new(HistoryToolStrategy::new(
            HistoryStrategy::GlobalHistory,
            Arc::clone(&runner),
            Duration::from_secs(1),
        )),
        Box::new(HistoryToolStrategy::new(
            HistoryStrategy::per_application_with(&[]),
            Arc::clone(&runner),
            Duration::from_secs(1),
        )),
    ];
    let client =
        SlackApiClient::new(api_base, "xoxb-test".to_string(), 2_000, 1, 1).expect("client");
    RelayMonitor::new(
        MonitorConfig {
            channel: "#notifications".to_string(),
            poll_interval,
            heartbeat_every: 12,
            access_check_timeout: Duration::from_millis(50),
            skip_access_check: false,
        },
        RelayContext::with_offset("desk-01", "US-East", "GMT-5"),
        NotificationAcquirer::new(strategies),
        Arc::new(SlackDelivery::new(client)),
        SeenIdStore::in_memory(64),
    )
    .with_history_runner(runner)
}

#[tokio::test]
async fn integration_store_notifications_are_relayed_once_without_touching_history() {
    let server = MockServer::start();
    let hello = server.mock(|when, then| {
        when.method(POST)
            .path("/chat.postMessage")
            .header("authorization", "Bearer xoxb-test")
            .body_includes("Hello\\nWorld\\n");
        then.status(200)
            .json_body(json!({ "ok": true, "channel": "C1", "ts": "1.0" }));
    });
    let promoted = server.mock(|when, then| {
        when.method(POST)
            .path("/chat.postMessage")
            .body_includes("Standup moved to 10am");
        then.status(200)
            .json_body(json!({ "ok": true, "channel": "C1", "ts": "1.1" }));
    });

    let temp = tempdir().expect("tempdir");
    let store_path = temp.path().join("wpndatabase.db");
    let connection = create_store(&store_path);
    insert_toast(
        &connection,
        1,
        "<toast><visual><binding><text>Hello</text><text>World</text></binding></visual></toast>",
        200,
    );
    insert_toast(
        &connection,
        2,
        "<toast><text></text><text>Standup moved to 10am</text></toast>",
        100,
    );

    let history = Arc::new(ScriptedHistory::new(
        r#"[{"Id":"9","Group":"g","Tag":"","AppId":"slack","Title":"From history","Body":""}]"#,
        "[]",
    ));
    let mut monitor = relay(
        &store_path,
        Arc::clone(&history),
        server.base_url(),
        Duration::ZERO,
    );

    let first = monitor.run_cycle().await.expect("first cycle");
    assert_eq!(first.source, Some("notification-db"));
    assert_eq!(first.acquired, 2);
    assert_eq!(first.delivered, 2);
    assert_eq!(hello.calls(), 1);
    assert_eq!(promoted.calls(), 1);
    assert_eq!(history.queries.load(Ordering::SeqCst), 0);
    assert!(monitor.seen().contains("1_chat_"));
}

#[tokio::test]
async fn integration_history_fallback_runs_global_before_per_application() {
    let server = MockServer::start();
    let post = server.mock(|when, then| {
        when.method(POST)
            .path("/chat.postMessage")
            .json_body_includes(json!({ "channel": "#notifications" }).to_string())
            .body_includes("| Slack |");
        then.status(200)
            .json_body(json!({ "ok": true, "channel": "C1", "ts": "2.0" }));
    });

    let temp = tempdir().expect("tempdir");
    let history = Arc::new(ScriptedHistory::new(
        "[]",
        r#"{"Id":7,"Group":"g","Tag":"t","AppId":"com.slack.Slack","Title":"Ping","Body":"from per-app"}"#,
    ));
    let mut monitor = relay(
        &temp.path().join("missing.db"),
        Arc::clone(&history),
        server.base_url(),
        Duration::ZERO,
    );

    let report = monitor.run_cycle().await.expect("cycle");
    assert_eq!(report.source, Some("per-app-history"));
    assert_eq!(report.delivered, 1);
    assert_eq!(history.queries.load(Ordering::SeqCst), 2);
    assert_eq!(post.calls(), 1);
    assert!(monitor.seen().contains("7_g_t"));

    let repeat = monitor.run_cycle().await.expect("second cycle");
    assert_eq!(repeat.acquired, 0);
    assert_eq!(post.calls(), 1);
}

#[tokio::test]
async fn integration_channel_not_found_does_not_stop_the_monitor() {
    let server = MockServer::start();
    let post = server.mock(|when, then| {
        when.method(POST).path("/chat.postMessage");
        then.status(200)
            .json_body(json!({ "ok": false, "error": "channel_not_found" }));
    });

    let temp = tempdir().expect("tempdir");
    let store_path = temp.path().join("wpndatabase.db");
    let connection = create_store(&store_path);
    insert_toast(&connection, 1, "<toast><text>One</text></toast>", 3);
    insert_toast(&connection, 2, "<toast><text>Two</text></toast>", 2);
    insert_toast(&connection, 3, "<toast><text>Three</text></toast>", 1);

    let mut monitor = relay(
        &store_path,
        Arc::new(ScriptedHistory::new("[]", "[]")),
        server.base_url(),
        Duration::from_millis(5),
    );
    monitor
        .run_until(tokio::time::sleep(Duration::from_millis(40)))
        .await
        .expect("monitor stops cleanly");

    assert_eq!(monitor.state(), MonitorState::Stopped);
    assert_eq!(post.calls(), 3);
}
