//! Test utilities and fixtures for Cardmint integration tests

#![allow(dead_code)]

use axum::routing::{get, post};
use axum::Router;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

pub use cardmint::db::{init_db, queries, AppState};
pub use cardmint::handlers::public::{current_balance, grant_history, initiate_credits_purchase};
pub use cardmint::handlers::webhooks::handle_stripe_webhook;
pub use cardmint::handlers::webhooks::reconcile::{apply_grant, GrantFacts, GrantOutcome};
pub use cardmint::models::*;
pub use cardmint::payments::{StripeClient, StripeConfig};
pub use cardmint::util;

pub const TEST_WEBHOOK_SECRET: &str = "whsec_test_secret";

/// Create an in-memory test database with schema initialized
pub fn setup_test_db() -> Connection {
    let conn = Connection::open_in_memory().expect("Failed to create in-memory database");
    init_db(&conn).expect("Failed to initialize schema");
    conn
}

pub fn test_stripe_config() -> StripeConfig {
    StripeConfig {
        secret_key: "sk_test_xxx".to_string(),
        webhook_secret: TEST_WEBHOOK_SECRET.to_string(),
    }
}

/// Create an AppState for testing with an in-memory database.
/// Pool size 1 so the handler and the test assertions see the same
/// in-memory database.
pub fn create_test_app_state() -> AppState {
    let manager = SqliteConnectionManager::memory();
    let pool = Pool::builder().max_size(1).build(manager).unwrap();
    {
        let conn = pool.get().unwrap();
        init_db(&conn).unwrap();
    }

    AppState {
        db: pool,
        stripe: StripeClient::new(&test_stripe_config()),
        base_url: "http://localhost:3000".to_string(),
        success_url: "http://localhost:3000/success".to_string(),
        cancel_url: "http://localhost:3000/cancel".to_string(),
    }
}

/// Create a test account, returning it together with its plaintext API key
pub fn create_test_account(conn: &Connection, name: &str) -> (Account, String) {
    let api_key = util::generate_api_key();
    let account = queries::create_account(
        conn,
        &CreateAccount {
            display_name: name.to_string(),
        },
        &util::hash_api_key(&api_key),
    )
    .expect("Failed to create test account");
    (account, api_key)
}

/// Apply a grant through the reconciliation engine
pub fn apply_test_grant(conn: &Connection, account_id: &str, reference_id: &str, credits: i64) {
    let facts = GrantFacts {
        account_id: account_id.to_string(),
        credits,
        reference_id: reference_id.to_string(),
        usd: None,
    };
    apply_grant(conn, &facts).expect("Grant should apply");
}

pub fn count_ledger_entries(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM ledger_entries", [], |row| row.get(0))
        .expect("Failed to count ledger entries")
}

pub fn count_ledger_entries_for_reference(conn: &Connection, reference_id: &str) -> i64 {
    conn.query_row(
        "SELECT COUNT(*) FROM ledger_entries WHERE reference_id = ?1",
        [reference_id],
        |row| row.get(0),
    )
    .expect("Failed to count ledger entries")
}

/// Create a Router with all public endpoints (without rate limiting for tests)
pub fn public_app(state: AppState) -> Router {
    Router::new()
        .route("/credits/buy", post(initiate_credits_purchase))
        .route("/credits/balance", get(current_balance))
        .route("/credits/grants", get(grant_history))
        .with_state(state)
}

/// Create a Router with the webhook endpoint
pub fn webhook_app(state: AppState) -> Router {
    Router::new()
        .route("/webhook/stripe", post(handle_stripe_webhook))
        .with_state(state)
}

// ============ Stripe signature helpers ============

pub fn compute_stripe_signature(payload: &[u8], secret: &str, timestamp: &str) -> String {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    type HmacSha256 = Hmac<Sha256>;

    let signed_payload = format!("{}.{}", timestamp, String::from_utf8_lossy(payload));
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(signed_payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Get current Unix timestamp as a string (for webhook signature tests)
pub fn current_timestamp() -> String {
    chrono::Utc::now().timestamp().to_string()
}

/// Build a valid stripe-signature header for a payload, signed with the
/// test webhook secret
pub fn stripe_signature_header(payload: &[u8]) -> String {
    let timestamp = current_timestamp();
    let signature = compute_stripe_signature(payload, TEST_WEBHOOK_SECRET, &timestamp);
    format!("t={},v1={}", timestamp, signature)
}

// ============ Webhook payload builders ============

pub fn checkout_completed_payload(
    account_id: &str,
    credits: i64,
    usd: i64,
    payment_intent: &str,
) -> String {
    serde_json::json!({
        "id": "evt_test_checkout",
        "type": "checkout.session.completed",
        "data": {
            "object": {
                "id": "cs_test_1",
                "payment_status": "paid",
                "payment_intent": payment_intent,
                "metadata": {
                    "kind": "credits_purchase",
                    "account_id": account_id,
                    "credits": credits.to_string(),
                    "usd": usd.to_string(),
                }
            }
        }
    })
    .to_string()
}

pub fn payment_intent_succeeded_payload(account_id: &str, credits: i64, payment_intent: &str) -> String {
    serde_json::json!({
        "id": "evt_test_intent",
        "type": "payment_intent.succeeded",
        "data": {
            "object": {
                "id": payment_intent,
                "amount": 2500,
                "metadata": {
                    "kind": "credits_purchase",
                    "account_id": account_id,
                    "credits": credits.to_string(),
                    "usd": "25",
                }
            }
        }
    })
    .to_string()
}

pub fn charge_succeeded_payload(account_id: &str, credits: i64, payment_intent: &str) -> String {
    serde_json::json!({
        "id": "evt_test_charge",
        "type": "charge.succeeded",
        "data": {
            "object": {
                "id": "ch_test_1",
                "payment_intent": payment_intent,
                "metadata": {
                    "kind": "credits_purchase",
                    "account_id": account_id,
                    "credits": credits.to_string(),
                    "usd": "25",
                }
            }
        }
    })
    .to_string()
}
