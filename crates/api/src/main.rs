use std::path::Path;

use anyhow::Context;

use storefront_infra::{load_env_file, AppConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Before logging init so `.env` can carry RUST_LOG and LOG_FORMAT.
    let env_file = load_env_file(Path::new(".env"));
    storefront_observability::init();
    if env_file.context("failed to load .env")? {
        tracing::info!("loaded variables from .env");
    }

    let config = AppConfig::from_env().context("invalid configuration")?;
    tracing::debug!(?config, "loaded configuration");

    let app = storefront_api::app::build_app(&config).await?;

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
