// src/main.rs

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use examredi::config::Config;
use examredi::models::user::{Role, Subscription, User};
use examredi::providers::{BrevoMailer, GeminiClient};
use examredi::routes;
use examredi::state::{AppState, Store};
use examredi::store::{self, MemoryStore, PgStore, StoreError};
use examredi::utils::hash::hash_password;
use serde_json::json;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load configuration from environment (.env included)
    let config = Config::from_env();

    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    let store = connect_store(&config).await;

    // Seed Admin User
    if let Err(e) = seed_admin_user(&store, &config).await {
        tracing::error!("Failed to seed admin user: {:?}", e);
    }

    if config.gemini_api_key.is_none() {
        tracing::warn!("GEMINI_API_KEY is not set; AI endpoints will answer 500");
    }
    if config.brevo_api_key.is_none() {
        tracing::warn!("BREVO_API_KEY is not set; emails will not be delivered");
    }

    let state = AppState {
        store,
        ai: Arc::new(GeminiClient::new(
            config.gemini_api_key.clone(),
            config.gemini_model.clone(),
        )),
        mailer: Arc::new(BrevoMailer::new(
            config.brevo_api_key.clone(),
            config.from_email.clone(),
        )),
        config: config.clone(),
    };

    // Create the Axum application router
    let app = routes::create_router(state);

    // Bind to the listening address
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("ExamRedi listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .unwrap_or_else(|e| panic!("Failed to bind {}: {}", addr, e));

    // Peer addresses feed the per-IP rate limiter.
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Server error");
}

/// `memory://` keeps everything in process; anything else is a Postgres URL.
async fn connect_store(config: &Config) -> Store {
    if config.database_url.starts_with("memory") {
        tracing::warn!("Using the in-memory store; data is lost on restart");
        return Arc::new(MemoryStore::new());
    }

    // Initialize Database Pool with Retry
    let mut retry_count = 0;
    let pool = loop {
        match PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.database_url)
            .await
        {
            Ok(pool) => break pool,
            Err(e) => {
                retry_count += 1;
                if retry_count > 5 {
                    panic!("Failed to connect to database after 5 retries: {}", e);
                }
                tracing::warn!("Database not ready, retrying in 2s... (Attempt {})", retry_count);
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    };

    tracing::info!("Database connected...");

    // Run Migrations Automatically
    tracing::info!("Running migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Migrations applied successfully.");

    Arc::new(PgStore::new(pool))
}

async fn seed_admin_user(store: &Store, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) {
        let existing = store::find_one::<User>(store.as_ref(), &json!({ "email": email.to_lowercase() })).await?;

        if existing.is_none() {
            tracing::info!("Seeding admin user: {}", email);
            let hashed_password = hash_password(password)?;

            let mut admin = User::new("Admin".to_string(), email, Some(hashed_password));
            admin.role = Role::Admin;
            admin.set_subscription(Subscription::Pro);
            admin.is_verified = true;

            match store::create(store.as_ref(), &admin).await {
                Ok(()) => tracing::info!("Admin user created successfully."),
                Err(StoreError::Duplicate { .. }) => {}
                Err(e) => return Err(e.into()),
            }
        }
    }
    Ok(())
}
