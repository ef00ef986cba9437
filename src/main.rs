use axum::Router;
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use std::sync::Arc;
use std::time::Duration;

use keywarden::config::Config;
use keywarden::db::{create_pool, init_db, AppState};
use keywarden::expiry::ExpiryWatcher;
use keywarden::handlers;
use keywarden::hooks::{EntitlementHook, NullHook, WebhookHook};
use keywarden::models::{CreateOrder, DEFAULT_PRODUCT};
use keywarden::notify::{NotificationPoller, WebhookNotifier};
use keywarden::token::TokenCodec;
use keywarden::util::{days_to_seconds, now};

#[derive(Parser, Debug)]
#[command(name = "keywarden")]
#[command(about = "Entitlement engine: signed license keys, device binding, and time exchange")]
struct Cli {
    /// Seed the database with dev data (a license and a pending order)
    #[arg(long)]
    seed: bool,

    /// Delete the database on exit (dev mode only, useful for fresh starts)
    #[arg(long)]
    ephemeral: bool,
}

/// Seeds the database with dev data for manual testing.
/// Creates one active license and one unclaimed pending order.
/// Only runs in dev mode and when the licenses table is empty.
fn seed_dev_data(state: &AppState) {
    let stats = state.licenses.stats(None).expect("Failed to read license stats");
    if stats.total > 0 {
        tracing::info!("Database already has data, skipping seed");
        return;
    }

    tracing::info!("============================================");
    tracing::info!("SEEDING DEV DATA");
    tracing::info!("============================================");

    let license = state
        .licenses
        .issue(
            &state.codec,
            "100000000000000001",
            "Dev Owner",
            DEFAULT_PRODUCT,
            now() + days_to_seconds(30.0),
            None,
        )
        .expect("Failed to create dev license");

    tracing::info!("License owner: {} ({})", license.owner_id, license.owner_name);
    tracing::info!("License product: {} (30 days)", license.product);

    let order = state
        .orders
        .create(&CreateOrder {
            email: "buyer@keywarden.local".to_string(),
            product: DEFAULT_PRODUCT.to_string(),
            days: 30,
            order_number: Some("DEV-1001".to_string()),
            customer_name: Some("Dev Buyer".to_string()),
        })
        .expect("Failed to create dev pending order");

    tracing::info!("Pending order: {} ({})", order.id, order.email);

    tracing::info!("============================================");
    tracing::info!("DEV DATA SEEDED SUCCESSFULLY");
    tracing::info!("============================================");

    // Copy-paste friendly output without log formatting.
    println!();
    println!("--- COPY FROM HERE ---");
    println!("  license_key: {}", license.license_key);
    println!("  owner_id: {}", license.owner_id);
    println!("  order_email: {}", order.email);
    println!("--- END COPY ---");
    println!();
}

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "keywarden=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env();

    if config.dev_mode {
        tracing::info!("Running in DEVELOPMENT mode");
    }

    // Create the database connection pool and initialize the schema
    let db_pool = create_pool(&config.database_path).expect("Failed to create database pool");
    {
        let conn = db_pool.get().expect("Failed to get connection");
        init_db(&conn).expect("Failed to initialize database");
    }

    let hooks: Arc<dyn EntitlementHook> = match config.entitlement_webhook_url.as_deref() {
        Some(url) => {
            tracing::info!("Entitlement events will be posted to {}", url);
            Arc::new(WebhookHook::new(url))
        }
        None => Arc::new(NullHook),
    };

    let codec = TokenCodec::new(config.secret_key.clone());
    let state = AppState::new(
        db_pool,
        codec,
        hooks.clone(),
        config.service_token.clone(),
        config.min_client_version.clone(),
    );

    // Seed dev data if --seed flag is passed (only in dev mode)
    if cli.seed {
        if !config.dev_mode {
            tracing::warn!("--seed flag ignored: not in dev mode (set KEYWARDEN_ENV=dev)");
        } else {
            seed_dev_data(&state);
        }
    }

    // Start the expiry and warning sweeps
    ExpiryWatcher::new(
        state.licenses.clone(),
        hooks,
        config.expiry_sweep_secs,
        config.warning_sweep_secs,
        config.warning_window_days,
    )
    .spawn();

    // Start the in-process notification poller when a webhook is configured;
    // otherwise delivery is driven out-of-process via /notifications.
    match config.notify_webhook_url.as_deref() {
        Some(url) => {
            NotificationPoller::new(
                state.notifications.clone(),
                Arc::new(WebhookNotifier::new(url)),
                config.notify_batch,
            )
            .spawn(Duration::from_secs(config.notify_poll_secs));
            tracing::info!(
                "Notification poller started (every {}s, batch {}, posting to {})",
                config.notify_poll_secs,
                config.notify_batch,
                url
            );
        }
        None => {
            tracing::info!("No NOTIFY_WEBHOOK_URL set; notifications are polled over HTTP");
        }
    }

    // Build the application router
    let app = Router::new()
        // Public endpoints (rate limited, no auth)
        .merge(handlers::public::router(
            config.rate_limit_per_second,
            config.rate_limit_burst,
        ))
        // Service endpoints (bot/storefront adapter, bearer auth)
        .merge(handlers::service::router(state.clone()))
        // Admin endpoints (operator tooling, same bearer)
        .merge(handlers::admin::router(state.clone()))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start the server
    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    // Track if we should clean up on exit
    let cleanup_on_exit = cli.ephemeral && config.dev_mode;
    let db_path = config.database_path.clone();

    if cleanup_on_exit {
        tracing::info!("EPHEMERAL MODE: database will be deleted on exit");
    }

    tracing::info!("Keywarden server listening on {}", addr);

    // Run server with graceful shutdown
    // Use into_make_service_with_connect_info to enable IP-based rate limiting
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Failed to start server");

    // Cleanup on exit if ephemeral mode
    if cleanup_on_exit {
        tracing::info!("Cleaning up ephemeral database...");
        if let Err(e) = std::fs::remove_file(&db_path) {
            tracing::warn!("Failed to remove {}: {}", db_path, e);
        } else {
            tracing::info!("Removed {}", db_path);
        }
        // Also remove WAL and SHM files if they exist
        let _ = std::fs::remove_file(format!("{}-wal", db_path));
        let _ = std::fs::remove_file(format!("{}-shm", db_path));
        tracing::info!("Ephemeral cleanup complete");
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping server...");
}
