#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use flowrelay_server::api::AppState;
use flowrelay_server::build_router;
use flowrelay_server::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing logger
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,flowrelay_server=debug".into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .init();

    tracing::info!("Starting FlowRelay server");

    let config = ServerConfig::load()?;
    let addr = format!("{}:{}", config.host, config.port);

    let state = AppState::new(config);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("FlowRelay running on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
