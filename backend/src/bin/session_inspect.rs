use std::{path::PathBuf, sync::Arc};

use slotguard_backend::{
    config::Config,
    services::{
        session_pool::SessionPool,
        session_store::{LoadOutcome, SessionStore},
    },
    utils::time::SystemClock,
};

/// Prints the slots held in a persisted session snapshot.
///
/// Usage: `session_inspect [PATH]`. Without a path, SESSION_STORE_PATH from the
/// environment is used. The file is read only; expired slots are shown as swept.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "slotguard_backend=warn".into()),
        )
        .init();

    let config = Config::load()?;
    let path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| config.session_store_path.clone());

    let pool = SessionPool::new(config.session_capacity, Arc::new(SystemClock))?;
    let store = SessionStore::new(path);
    match store.load(&pool).await {
        LoadOutcome::Missing => anyhow::bail!("no session snapshot at {}", store.path().display()),
        LoadOutcome::Discarded => anyhow::bail!(
            "session snapshot at {} is unreadable or was written for a different capacity",
            store.path().display()
        ),
        LoadOutcome::Empty | LoadOutcome::Restored { .. } => {}
    }

    let views = pool.list_active();
    println!(
        "{}: capacity {}, {} active, {} used",
        store.path().display(),
        pool.capacity(),
        pool.active_count(),
        views.len()
    );
    for view in views {
        println!(
            "{:>3}  {:<8} {:<15} {:<16} created={} last_access={} expires={}  {}",
            view.slot_id,
            if view.active { "active" } else { "inactive" },
            view.client_ip,
            view.subject,
            view.created_at.to_rfc3339(),
            view.last_access_at.to_rfc3339(),
            view.expires_at.to_rfc3339(),
            view.user_agent
        );
    }

    Ok(())
}
