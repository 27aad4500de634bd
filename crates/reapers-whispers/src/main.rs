use reapers_whispers::{ReaperError, ReaperServer, ServerConfig, init_logging};

#[tokio::main]
async fn main() -> Result<(), ReaperError> {
    init_logging();

    let config = ServerConfig::from_env()?;
    tracing::info!(
        board_size = config.session.board_size,
        max_players = config.session.max_players,
        turn_secs = config.session.turn_duration.as_secs(),
        pickup_mode = ?config.session.pickup_mode,
        "configuration loaded"
    );

    let server = ReaperServer::builder().config(config).build().await?;
    tracing::info!(addr = %server.local_addr()?, "listening");

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await
}
