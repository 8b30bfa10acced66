use anyhow::{Context, Result};
use tokio::io::{stdin, stdout, BufReader};

use retail_insights::{config, tools::ToolServer, AppState};

/// Stdio tool server. Stdout carries protocol frames only, logs go to stderr.
#[tokio::main]
async fn main() -> Result<()> {
    let cfg = config::load_config().context("failed to load configuration")?;
    config::init_stderr_tracing(cfg.log_level());

    let state = AppState::from_config(cfg).context("failed to build application state")?;
    let server = ToolServer::from_state(&state);

    server
        .run(BufReader::new(stdin()), stdout())
        .await
        .context("tool server I/O failed")?;
    Ok(())
}
