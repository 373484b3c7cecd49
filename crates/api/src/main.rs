use std::sync::Arc;

use anyhow::Context;

use forgewms_auth::Hs256IdentityProvider;
use forgewms_infra::EngineConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    forgewms_observability::init();

    let config = EngineConfig::from_env().context("invalid configuration")?;

    let jwt_secret = config.jwt_secret.clone().unwrap_or_else(|| {
        tracing::warn!("JWT_SECRET not set; using insecure dev default");
        "dev-secret".to_string()
    });
    let identity = Arc::new(Hs256IdentityProvider::new(jwt_secret.as_bytes()));

    let services = Arc::new(forgewms_api::app::services::build_services(&config).await?);
    let app = forgewms_api::app::build_app(services, identity);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(
        addr = %listener.local_addr()?,
        tolerance = %config.allocation_policy.tolerance(),
        max_retries = config.max_retries,
        "listening"
    );

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
