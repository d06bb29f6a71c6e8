//! Notification acquisition for the toast relay.
//!
//! Reads the platform notification database first and falls back to querying live
//! notification history through an external shell. Every source deduplicates against
//! the shared `SeenIdStore` at the moment a row is accepted.

pub mod acquisition;
pub mod history_runner;
pub mod history_scripts;
pub mod history_strategy;
pub mod payload;
pub mod structured_store;

pub use acquisition::{
    AcquisitionReport, AcquisitionStrategy, FetchOutcome, NotificationAcquirer, StrategyAttempt,
};
pub use history_runner::{
    parse_history_output, HistoryEntry, HistoryQueryError, HistoryQueryOutput,
    HistoryQueryRunner, ShellHistoryRunner,
};
pub use history_scripts::{HistoryStrategy, KNOWN_HISTORY_APP_IDS};
pub use history_strategy::{HistoryToolStrategy, DEFAULT_HISTORY_TIMEOUT};
pub use payload::{parse_toast_payload, TextExtraction, ToastText};
pub use structured_store::{
    default_notification_db_path, StructuredStoreReader, DEFAULT_STORE_BUSY_TIMEOUT,
    STORE_ROW_LIMIT,
};
