use axum::Router;
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use std::time::Duration;

use cardmint::config::Config;
use cardmint::db::{create_pool, init_db, queries, AppState};
use cardmint::handlers;
use cardmint::models::{CreateAccount, CreateLedgerEntry, GrantReason};
use cardmint::payments::StripeClient;
use cardmint::util;

#[derive(Parser, Debug)]
#[command(name = "cardmint")]
#[command(about = "Credits ledger and Stripe reconciliation backend for the Cardmint storefront")]
struct Cli {
    /// Seed the database with dev data (demo account + starter credits)
    #[arg(long)]
    seed: bool,

    /// Run the balance reconciliation sweep (rewrite balances from ledger sums) and exit
    #[arg(long)]
    reconcile: bool,
}

/// Seeds the database with dev data for testing.
/// Creates a demo account and applies a starter credit grant through the
/// same ledger + balance path the webhook engine uses.
/// Only runs in dev mode and when the database is empty.
fn seed_dev_data(state: &AppState) {
    let conn = state.db.get().expect("Failed to get db connection for seeding");

    let count = queries::count_accounts(&conn).expect("Failed to count accounts");
    if count > 0 {
        tracing::info!("Database already has data, skipping seed");
        return;
    }

    let api_key = util::generate_api_key();
    let account = queries::create_account(
        &conn,
        &CreateAccount {
            display_name: "Dev Collector".to_string(),
        },
        &util::hash_api_key(&api_key),
    )
    .expect("Failed to create dev account");

    let reference = format!("seed_{}", uuid::Uuid::new_v4().as_simple());
    let entry = CreateLedgerEntry {
        reference_id: reference,
        account_id: account.id.clone(),
        amount: 500,
        reason: GrantReason::Adjustment,
        metadata: None,
    };
    queries::insert_ledger_entry(&conn, &entry).expect("Failed to seed starter grant");
    let balance = queries::increment_balance(&conn, &account.id, entry.amount)
        .expect("Failed to seed starter balance");

    tracing::info!("============================================");
    tracing::info!("DEV ACCOUNT CREATED");
    tracing::info!("Account: {} ({})", account.display_name, account.id);
    tracing::info!("API Key: {}", api_key);
    tracing::info!("Starter credits: {}", balance);
    tracing::info!("============================================");
    tracing::info!("SAVE THIS API KEY - IT WILL NOT BE SHOWN AGAIN");
    tracing::info!("============================================");
}

/// Run the reconciliation sweep once and report what it corrected.
fn run_reconcile_sweep(database_path: &str) -> Result<(), String> {
    let pool = create_pool(database_path)
        .map_err(|e| format!("Failed to create database pool: {}", e))?;
    let conn = pool
        .get()
        .map_err(|e| format!("Failed to get database connection: {}", e))?;
    init_db(&conn).map_err(|e| format!("Failed to initialize database: {}", e))?;

    let corrected = queries::recompute_balances(&conn)
        .map_err(|e| format!("Reconciliation sweep failed: {}", e))?;

    println!("Reconciliation sweep complete: {} balance(s) corrected", corrected);
    Ok(())
}

/// Spawns a background task that periodically rewrites balances from ledger
/// sums, repairing any projection left stale by a partial webhook failure.
fn spawn_sweep_task(state: AppState, interval_secs: u64) {
    tokio::spawn(async move {
        let interval = Duration::from_secs(interval_secs);

        loop {
            tokio::time::sleep(interval).await;

            match state.db.get() {
                Ok(conn) => match queries::recompute_balances(&conn) {
                    Ok(count) => {
                        if count > 0 {
                            tracing::warn!(
                                "Reconciliation sweep corrected {} stale balance(s)",
                                count
                            );
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Reconciliation sweep failed: {}", e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to get db connection for sweep: {}", e);
                }
            }
        }
    });

    tracing::info!(
        "Reconciliation sweep task started (runs every {} seconds)",
        interval_secs
    );
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cardmint=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Handle the one-shot sweep command (before normal startup)
    if cli.reconcile {
        dotenvy::dotenv().ok();
        let db_path =
            std::env::var("DATABASE_PATH").unwrap_or_else(|_| "cardmint.db".to_string());

        if let Err(e) = run_reconcile_sweep(&db_path) {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
        return;
    }

    // Load configuration
    let config = Config::from_env();

    if config.dev_mode {
        tracing::info!("Running in DEVELOPMENT mode");
    }

    // Create database connection pool and initialize schema
    let db_pool = create_pool(&config.database_path).expect("Failed to create database pool");
    {
        let conn = db_pool.get().expect("Failed to get connection");
        init_db(&conn).expect("Failed to initialize database");
    }

    let state = AppState {
        db: db_pool,
        stripe: StripeClient::new(&config.stripe),
        base_url: config.base_url.clone(),
        success_url: config.success_url.clone(),
        cancel_url: config.cancel_url.clone(),
    };

    // Seed dev data if --seed flag is passed (only in dev mode)
    if cli.seed {
        if !config.dev_mode {
            tracing::warn!("--seed flag ignored: not in dev mode (set CARDMINT_ENV=dev)");
        } else {
            seed_dev_data(&state);
        }
    }

    // Start the periodic reconciliation sweep (0 = disabled)
    if config.sweep_interval_secs > 0 {
        spawn_sweep_task(state.clone(), config.sweep_interval_secs);
    }

    // Build the application router
    let app = Router::new()
        // Public endpoints (account API key auth, per-IP rate limits)
        .merge(handlers::public::router(config.rate_limit))
        // Webhook endpoints (signature auth)
        .merge(handlers::webhooks::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start the server
    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Cardmint server listening on {}", addr);

    // Run server with graceful shutdown
    // Use into_make_service_with_connect_info to enable IP-based rate limiting
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Failed to start server");
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping server...");
}
