use anyhow::Result;
use clap::Parser;
use toast_monitor::{init_tracing, load_dotenv, run_relay, Cli};
use tracing::{debug, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let dotenv = load_dotenv();
    init_tracing();
    for path in &dotenv.loaded {
        debug!(path = %path.display(), "loaded environment file");
    }
    for error in &dotenv.errors {
        warn!(%error, "failed to load environment file");
    }

    let cli = Cli::parse();
    run_relay(cli).await
}
