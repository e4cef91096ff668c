use ledgerline_server::{config::ServerConfig, create_router, telemetry, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::load()?;
    telemetry::init(config.log_format, &config.log_filter);

    let addr = config.socket_addr()?;
    let state = AppState::new(config.build_importer()?);
    let app = create_router(state, config.max_upload_bytes);

    tracing::info!(%addr, max_upload_bytes = config.max_upload_bytes, "starting server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
