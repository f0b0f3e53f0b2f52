use std::sync::Arc;

use anyhow::Context;

use tavern_infra::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tavern_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    tracing::info!(
        max_concurrent_jobs = config.max_concurrent_jobs,
        redis = config.redis_url.is_some(),
        "configuration loaded"
    );

    let services = tavern_api::app::build_services(&config).context("failed to build services")?;
    let app = tavern_api::app::build_app(Arc::new(services));

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
