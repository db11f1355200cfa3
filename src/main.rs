use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tenderec_api::config::Config;
use tenderec_api::db::Database;
use tenderec_api::db_storage::postgres_stores;
use tenderec_api::evaluation::Evaluator;
use tenderec_api::handlers::{self, AppState};
use tenderec_api::judge::OpenAiJudge;
use tenderec_api::services::{CompanyService, RecommendationService};
use tenderec_api::tender_source::TenderCatalog;

/// Main entry point for the application.
///
/// Initializes tracing, configuration, the database and schema, the tender
/// corpus, the judge client and the HTTP router, then starts the Axum server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tenderec_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let db = Database::new(&config.database_url).await?;
    tracing::info!("Database connection pool established");
    db.ensure_schema().await?;

    let tenders = Arc::new(TenderCatalog::load(&config.tenders_path)?);
    if tenders.is_empty() {
        tracing::warn!("Tender corpus at {} is empty", config.tenders_path);
    }

    let judge = Arc::new(OpenAiJudge::new(config.judge_settings())?);
    tracing::info!("Judge client initialized: {}", config.llm_model);

    let stores = postgres_stores(db.pool.clone());
    let profiles = stores.profiles.clone();
    let verdicts = stores.verdicts.clone();
    let feedback = stores.feedback.clone();
    let industries = stores.industries.clone();

    let companies = CompanyService::new(profiles.clone(), judge.clone());
    let evaluator = Evaluator::new(judge, stores, tenders.clone(), config.llm_concurrency);
    let recommendations = RecommendationService::new(
        evaluator,
        profiles,
        verdicts,
        config.recommendations_source,
    );

    let app_state = Arc::new(AppState {
        config: config.clone(),
        recommendations,
        companies,
        feedback,
        industries,
        tenders,
    });

    // 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Invalid rate limiter configuration"))?,
    );

    let protected_routes = handlers::api_routes().layer(
        ServiceBuilder::new()
            .layer(RequestBodyLimitLayer::new(1024 * 1024))
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
