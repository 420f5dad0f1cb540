use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use survey::config::AppConfig;
use survey::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cfg = AppConfig::from_env()?;

    std::fs::create_dir_all(&cfg.data_dir)
        .with_context(|| format!("Failed to create data dir {}", cfg.data_dir.display()))?;

    let app_state = Arc::new(AppState::new(cfg.clone()));
    startup_checks(&app_state)?;
    spawn_session_sweeper(app_state.clone());

    let app = survey::build_router(app_state);

    let addr = &cfg.bind_addr;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(partition = ?cfg.partition, "survey listening on http://{addr}");
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}

/// Expire idle sessions even when no request arrives to trigger it.
fn spawn_session_sweeper(state: Arc<AppState>) {
    let period = state.config.session_idle.clamp(Duration::from_secs(1), Duration::from_secs(60));
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(period);
        loop {
            tick.tick().await;
            let expired = state.sweep().await;
            if expired > 0 {
                let remaining = state.session_count().await;
                info!(expired, remaining, "idle sessions swept");
            }
        }
    });
}

/// The image root must exist; an empty one is allowed but logged.
fn startup_checks(state: &AppState) -> Result<()> {
    let modalities = state
        .catalog
        .modalities()
        .with_context(|| format!("Cannot scan image root {}", state.config.image_root.display()))?;

    if modalities.is_empty() {
        warn!(root = %state.config.image_root.display(), "no modality contains images");
    } else {
        info!(modalities = ?modalities, "image root: ok");
    }
    Ok(())
}
