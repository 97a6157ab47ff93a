use std::{sync::Arc, time::Duration};

use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::info;

use crate::{
    api::handler::AppState,
    config::Config,
    error::AppResult,
    matching::{DispatchRepository, MatchingConfig, MatchingEngine},
    settlement::{PaymentGatewayClient, RetryPolicy},
};

pub async fn initialize_app_state(config: &Config) -> AppResult<AppState> {
    info!("Initializing application components ...");

    // Database pool
    let pool = initialize_database(&config.database_url).await?;

    let repository = Arc::new(DispatchRepository::new(pool));

    let matching_config = MatchingConfig {
        step_distance: config.matching_step_distance,
        max_distance: config.matching_max_distance,
        expansion_pause: config.matching_expansion_pause,
    };
    let matching_engine = Arc::new(MatchingEngine::new(repository.clone(), matching_config));
    info!(
        "✅ Matching engine initialized (step {}, ceiling {})",
        config.matching_step_distance, config.matching_max_distance
    );

    let payment_client = Arc::new(PaymentGatewayClient::new(RetryPolicy::default()));
    info!(
        "✅ Payment gateway client initialized for {}",
        config.payment_gateway_url
    );

    Ok(AppState {
        repository,
        matching_engine,
        payment_client,
        payment_gateway_url: config.payment_gateway_url.clone(),
    })
}

async fn initialize_database(database_url: &str) -> AppResult<PgPool> {
    info!("📊 Connecting to database...");

    let pool = PgPoolOptions::new()
        .max_connections(50)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .connect(database_url)
        .await?;

    // Run migrations
    info!("🔄 Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;

    info!("✓ Database initialized");
    Ok(pool)
}
