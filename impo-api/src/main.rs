use anyhow::Context;
use impo_api::{app, worker, AppState};
use impo_catalog::PricingEngine;
use impo_promo::PromotionRepository;
use impo_request::RequestRepository;
use impo_store::{Config, DbClient, InMemoryPromotionRepository, InMemoryRequestRepository};
use impo_store::{PgPromotionRepository, PgRequestRepository};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const PROMOTION_EXPIRY_CHECK: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "impo_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Impo API on port {}", config.server.port);

    let (request_repo, promotion_repo): (Arc<dyn RequestRepository>, Arc<dyn PromotionRepository>) =
        match &config.database.url {
            Some(url) => {
                let db = DbClient::new(url, config.database.max_connections)
                    .await
                    .context("Failed to connect to Postgres")?;
                db.migrate().await.context("Failed to run migrations")?;
                (
                    Arc::new(PgRequestRepository::new(db.pool.clone())),
                    Arc::new(PgPromotionRepository::new(db.pool)),
                )
            }
            None => {
                tracing::warn!("No database configured; data will be kept in memory only");
                (
                    Arc::new(InMemoryRequestRepository::new()),
                    Arc::new(InMemoryPromotionRepository::new()),
                )
            }
        };

    let engine = PricingEngine::new(config.pricing_config(), Arc::new(config.shipping_calculator()));
    let state = AppState::new(
        engine,
        request_repo,
        promotion_repo,
        config.session_config(),
        config.promotions.max_active,
    )
    .await?;

    tokio::spawn(worker::start_promotion_expiry_worker(
        state.promotions.clone(),
        PROMOTION_EXPIRY_CHECK,
    ));

    let requests = state.requests.clone();
    let app = app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Write edits still waiting for their debounce
    let failed = requests.close_all().await;
    if failed > 0 {
        tracing::warn!("{} requests could not be written before exit", failed);
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
