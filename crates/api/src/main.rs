use anyhow::Context;

use identyflow_api::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    identyflow_observability::tracing::init(config.log_format);
    if config.uses_dev_jwt_secret() {
        tracing::warn!("JWT_SECRET not set; using insecure dev default");
    }

    let port = config.port;
    let app = identyflow_api::app::build_app(config)
        .await
        .context("building the application")?;

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("failed to bind 0.0.0.0:{port}"))?;

    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app).await?;
    Ok(())
}
