use std::{net::SocketAddr, sync::Arc};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use slotguard_backend::{
    app,
    config::{AdminSecret, Config},
    services::{
        credentials::{CredentialVerifier, StaticCredentials},
        session_pool::SessionPool,
        session_store::SessionStore,
    },
    state::AppState,
    utils::time::SystemClock,
};

fn mask_secret(s: &str) -> String {
    if s.is_empty() {
        return "<empty>".into();
    }
    let prefix = s.chars().take(4).collect::<String>();
    format!("{}*** (len={})", prefix, s.len())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "slotguard_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::load()?;
    tracing::info!(
        bind_addr = %config.bind_addr,
        jwt_secret = %mask_secret(&config.jwt_secret),
        access_token_ttl_minutes = config.access_token_ttl_minutes,
        refresh_token_ttl_days = config.refresh_token_ttl_days,
        session_capacity = config.session_capacity,
        session_store_path = %config.session_store_path.display(),
        trust_proxy_headers = config.trust_proxy_headers,
        admin_username = %config.admin_username,
        "Loaded configuration from environment/.env"
    );

    let credentials: Arc<dyn CredentialVerifier> = match &config.admin_secret {
        AdminSecret::Hash(hash) => Arc::new(
            StaticCredentials::new(config.admin_username.clone(), hash.clone())
                .map_err(|e| anyhow::anyhow!("ADMIN_PASSWORD_HASH is not a valid argon2 hash: {}", e))?,
        ),
        AdminSecret::Plain(password) => {
            tracing::warn!("ADMIN_PASSWORD is set in plain text; prefer ADMIN_PASSWORD_HASH");
            Arc::new(StaticCredentials::from_plaintext(
                config.admin_username.clone(),
                password,
            )?)
        }
    };

    // Restore sessions that survived the last shutdown
    let sessions = Arc::new(SessionPool::new(
        config.session_capacity,
        Arc::new(SystemClock),
    )?);
    let store = SessionStore::new(config.session_store_path.clone());
    store.load(&sessions).await;

    let addr = config.bind_addr;
    let state = AppState::new(sessions.clone(), store.clone(), credentials, config);
    let app = app(state);

    tracing::info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    if let Err(error) = store.save(&sessions).await {
        tracing::warn!(error = %error, "failed to persist sessions on shutdown");
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %error, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                tracing::warn!(error = %error, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
