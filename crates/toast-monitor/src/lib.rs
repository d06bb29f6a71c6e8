//! Monitor runtime for the toast relay: configuration, host context, the advisory
//! history access check, and the poll/deliver/sleep loop.

pub mod access_check;
pub mod bootstrap;
pub mod cli_args;
pub mod context_resolver;
pub mod monitor_loop;
pub mod startup;

pub use access_check::check_history_access;
pub use bootstrap::{init_tracing, load_dotenv, DotenvLoad};
pub use cli_args::Cli;
pub use context_resolver::{
    country_from_geo_id, country_from_locale, region_from_timezone, resolve_machine_name,
    resolve_region, resolve_relay_context, RegionProbe, UNKNOWN_REGION,
};
pub use monitor_loop::{CycleReport, IdleHeartbeat, MonitorConfig, MonitorState, RelayMonitor};
pub use startup::{build_monitor, run_relay};
