use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

mod config;
mod dashboard;
mod errors;
mod models;
mod provider;
mod scoreboard;
mod sync;

use config::Config;
use dashboard::AppState;
use provider::{GameDataProvider, HttpProvider};
use sync::{build_initial_snapshot, DeltaFetcher, PollScheduler};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    let http = Arc::new(HttpProvider::new(
        &config.provider_url,
        config.fetch_timeout(),
    )?);
    match http.health().await {
        Ok(true) => info!("Provider reachable at {}", config.provider_url),
        Ok(false) => warn!("Provider at {} reports unhealthy", config.provider_url),
        Err(e) => warn!("Provider health check failed: {}", e),
    }
    let provider: Arc<dyn GameDataProvider> = http;

    let game_id = match config.game_id.clone() {
        Some(id) => id,
        None => {
            let cards = scoreboard::fetch_game_cards(provider.as_ref(), None).await?;
            let first = cards
                .first()
                .context("No game id given and no games on today's scoreboard")?;
            info!(
                "Following {} ({:?} vs {:?})",
                first.game_id, first.home.tri_code, first.away.tri_code
            );
            first.game_id.clone()
        }
    };

    let fetcher = Arc::new(DeltaFetcher::new(
        Arc::clone(&provider),
        config.fetch_timeout(),
    ));
    let scheduler = Arc::new(PollScheduler::new(
        &game_id,
        fetcher,
        config.poll_interval(),
    ));
    let load_error = Arc::new(RwLock::new(None));

    // Initial load runs in the background so the view can report "loading"
    {
        let provider = Arc::clone(&provider);
        let scheduler = Arc::clone(&scheduler);
        let load_error = Arc::clone(&load_error);
        tokio::spawn(async move {
            match build_initial_snapshot(provider.as_ref(), scheduler.game_id()).await {
                Ok(snapshot) => {
                    if let Err(e) = scheduler.start(snapshot) {
                        error!("Failed to start poll scheduler: {}", e);
                    }
                }
                Err(e) => {
                    error!("{}", e);
                    *load_error.write().await = Some(e.to_string());
                }
            }
        });
    }

    // Log every published snapshot
    {
        let mut rx = scheduler.subscribe();
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let current = rx.borrow_and_update().clone();
                if let Some(s) = current {
                    info!(
                        "{} {} {:?} - {:?} {}",
                        s.status_text().unwrap_or("-"),
                        s.teams.home.tri_code.as_deref().unwrap_or("HOME"),
                        s.teams.home.score,
                        s.teams.away.score,
                        s.teams.away.tri_code.as_deref().unwrap_or("AWAY"),
                    );
                }
            }
        });
    }

    let app = dashboard::router(AppState {
        scheduler: Arc::clone(&scheduler),
        provider,
        load_error,
    });
    let addr: SocketAddr = config.dashboard_addr.parse()?;
    info!("View listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Run the view server until Ctrl-C, then stop polling
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {}", e);
            }
            scheduler.stop();
        })
        .await?;

    Ok(())
}
