use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use fomo_score::config::Config;
use fomo_score::db::Database;
use fomo_score::db_storage::PgUserStore;
use fomo_score::fallback::FallbackCoordinator;
use fomo_score::handlers::{self, ApiDoc, AppState};
use fomo_score::health::{BackendHealth, ProbePolicy};
use fomo_score::memory_store::MemoryStore;
use fomo_score::scoring::{ScoreNormalizer, ScoringWeights};
use fomo_score::services::ScoreService;
use fomo_score::store::UserStore;
use fomo_score::verida_client::VeridaClient;

/// Builds the fallback-aware store: memory always, Postgres when configured.
async fn build_store(config: &Config) -> anyhow::Result<Arc<FallbackCoordinator>> {
    let memory = MemoryStore::new(config.wallet_rollup);
    let health = Arc::new(BackendHealth::new());
    let policy = ProbePolicy {
        attempts: config.db_connect_attempts,
        retry_delay: config.db_retry_delay,
        timeout: config.db_timeout,
    };

    let durable: Option<Arc<dyn UserStore>> =
        match config.database_url.as_deref().filter(|_| config.durable_enabled()) {
            Some(url) => {
                // Lazy pool: an unreachable database must not block startup.
                let db = Database::connect_lazy(url, config.db_timeout)?;
                Some(Arc::new(PgUserStore::new(db.pool, config.wallet_rollup)) as Arc<dyn UserStore>)
            }
            None => None,
        };

    let coordinator = Arc::new(FallbackCoordinator::new(durable, memory, health, policy));

    if coordinator.reconnect().await {
        tracing::info!("Using durable store");
    } else {
        tracing::warn!("Running with in-memory store; POST /api/admin/reconnect to retry");
    }

    Ok(coordinator)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fomo_score=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let store = build_store(&config).await?;

    let verida = VeridaClient::new(
        &config.verida_api_url,
        &config.verida_legacy_api_url,
        config.verida_timeout,
        config.engage_keywords.clone(),
        config.default_did.clone(),
    )?;
    tracing::info!("Verida client initialized: {}", config.verida_api_url);

    let normalizer = ScoreNormalizer::new(ScoringWeights::default(), config.engage_keywords.clone());
    let scores = Arc::new(ScoreService::new(store, normalizer, verida));

    let app_state = Arc::new(AppState {
        config: config.clone(),
        scores,
    });

    // Configure rate limiter: 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Invalid rate limiter configuration"))?,
    );

    let protected_routes = Router::new()
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(handlers::api_routes())
        .layer(
            ServiceBuilder::new()
                // Request size limit: 1MB max payload
                .layer(RequestBodyLimitLayer::new(1024 * 1024))
                // Rate limiting: 10 req/sec per IP, burst of 20
                .layer(GovernorLayer {
                    config: governor_conf,
                }),
        );

    // Health check bypasses rate limiting
    let app = Router::new()
        .route("/health", get(handlers::health))
        .merge(protected_routes)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
