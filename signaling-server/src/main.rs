use anyhow::Context;
use clap::Parser;
use log::info;
use simplelog::{ColorChoice, TermLogger, TerminalMode};

use peer_signal_server::{router, Config, ServerState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    TermLogger::init(
        config.log_level,
        simplelog::Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )?;

    let server_state = ServerState::from_config(&config);
    let app = router::create(server_state);

    info!(
        "signaling relay listening on {} in {:?} mode",
        config.address, config.mode
    );
    axum::Server::try_bind(&config.address)
        .with_context(|| format!("failed to bind {}", config.address))?
        .serve(app.into_make_service())
        .await?;
    Ok(())
}
