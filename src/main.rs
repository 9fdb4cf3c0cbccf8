use coursehub::{
    AppState,
    config::{AppConfig, Env},
    create_router,
    mailer::{LogMailer, MailerState},
    payos::{PayOsClient, PaymentGatewayState},
    repository::{PostgresRepository, RepositoryState},
    services::reminder::{spawn_attempt_expiry_sweep, spawn_vocabulary_reminder},
    storage::{S3StorageClient, StorageService, StorageState},
};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Loads configuration, sets up logging, connects Postgres (running pending
/// migrations), builds the storage, payment and mail clients, starts the background
/// jobs and serves HTTP.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // RUST_LOG wins over the default filter.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "coursehub=debug,tower_http=info".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.db_url)
        .await
        .map_err(|e| {
            tracing::error!("failed to connect to Postgres, check DATABASE_URL: {}", e);
            e
        })?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("database migrations applied");

    let repo = Arc::new(PostgresRepository::new(pool)) as RepositoryState;

    let s3_client = S3StorageClient::new(
        &config.s3_endpoint,
        &config.s3_region,
        &config.s3_key,
        &config.s3_secret,
        &config.s3_bucket,
    )
    .await;

    // MinIO in docker-compose starts without a bucket.
    if config.env == Env::Local {
        s3_client.ensure_bucket_exists().await;
    }
    let storage = Arc::new(s3_client) as StorageState;

    let payments = Arc::new(PayOsClient::new(config.payos.clone())) as PaymentGatewayState;
    let mailer = Arc::new(LogMailer) as MailerState;

    spawn_vocabulary_reminder(repo.clone(), mailer.clone(), config.reminder_hour_utc);
    spawn_attempt_expiry_sweep(repo.clone(), Duration::from_secs(config.attempt_sweep_seconds));

    let bind_addr = config.bind_addr.clone();
    let app_state = AppState {
        repo,
        storage,
        payments,
        mailer,
        config,
    };

    let app = create_router(app_state);
    let listener = TcpListener::bind(&bind_addr).await?;

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at: http://{}/swagger-ui", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
