use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use auth_service::app::{cors_layer, router, AppState};
use auth_service::config::load_service_config;
use auth_service::credentials::{CredentialVerifier, InMemoryCredentialVerifier};
use auth_service::pg::{PgAccessTokenRegistry, PgCredentialVerifier, PgRoleDirectory};
use common_auth::{AccessTokenRegistry, InMemoryAccessTokenRegistry, RoleAuthorizer};
use sqlx::PgPool;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = load_service_config()?;

    let (registry, credentials, authorizer): (
        Arc<dyn AccessTokenRegistry>,
        Arc<dyn CredentialVerifier>,
        RoleAuthorizer,
    ) =
        match &config.database_url {
            Some(database_url) => {
                let pool = PgPool::connect(database_url)
                    .await
                    .context("Failed to connect to Postgres")?;
                let authorizer = match config.role_count {
                    Some(count) => RoleAuthorizer::new(count)?.with_mode(config.role_match),
                    None => {
                        RoleAuthorizer::load(&PgRoleDirectory::new(pool.clone()), config.role_match)
                            .await?
                    }
                };
                let registry: Arc<dyn AccessTokenRegistry> =
                    Arc::new(PgAccessTokenRegistry::new(pool.clone()));
                let credentials: Arc<dyn CredentialVerifier> =
                    Arc::new(PgCredentialVerifier::new(pool));
                (registry, credentials, authorizer)
            }
            None => {
                warn!("DATABASE_URL not set; sessions are kept in process memory and sign-in has no accounts");
                let count = config
                    .role_count
                    .context("AUTH_ROLE_COUNT must be set when DATABASE_URL is absent")?;
                let registry: Arc<dyn AccessTokenRegistry> =
                    Arc::new(InMemoryAccessTokenRegistry::new());
                let credentials: Arc<dyn CredentialVerifier> =
                    Arc::new(InMemoryCredentialVerifier::new());
                (
                    registry,
                    credentials,
                    RoleAuthorizer::new(count)?.with_mode(config.role_match),
                )
            }
        };

    info!(
        role_count = authorizer.role_count(),
        role_match = %authorizer.mode(),
        "role authorizer ready"
    );

    let state = AppState::new(
        config.jwt.clone(),
        registry,
        credentials,
        authorizer,
        config.registry_timeout,
    )?;
    let app = router(state).layer(cors_layer(&config.allowed_origins)?);

    let addr = SocketAddr::from((config.host, config.port));
    info!(%addr, "starting auth-service");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
