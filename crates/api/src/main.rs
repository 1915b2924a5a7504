use anyhow::Context;

use arkpos_api::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    arkpos_observability::init();

    let config = AppConfig::from_env()?;
    let app = arkpos_api::app::build_app(&config).await?;

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;

    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app).await.context("server error")
}
