//! FlowSync - one-shot export of automation flows into sink tables

use anyhow::Context;
use flowsync_lib::{init_tracing, run_sync_with_config, LogFormat};
use tracing::{debug, info};

fn main() -> anyhow::Result<()> {
    let dotenv = dotenvy::dotenv();
    init_tracing(LogFormat::from_env());
    match dotenv {
        Ok(path) => info!(path = %path.display(), "Loaded .env"),
        Err(e) => debug!(error = %e, "No .env file loaded"),
    }

    let config = flowsync_infra::config::load().context("failed to load configuration")?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    let report = runtime.block_on(run_sync_with_config(&config))?;

    let rendered = serde_json::to_string_pretty(&report).context("failed to render report")?;
    println!("{rendered}");
    Ok(())
}
