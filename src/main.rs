use anyhow::Context;
use etherscan_session_verifier::{init_logs, run_http_server, Settings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::new().context("failed to parse config")?;
    init_logs(settings.jaeger.clone())?;
    run_http_server(settings).await
}
