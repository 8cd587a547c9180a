mod balance;
mod buy;

pub use balance::*;
pub use buy::*;

use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use rusqlite::Connection;
use serde::Serialize;

use crate::db::{queries, AppState};
use crate::error::{AppError, Result};
use crate::models::Account;
use crate::rate_limit::{self, RateLimitSettings};
use crate::util;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Resolve the calling account from its Bearer API key.
pub fn authenticate_account(conn: &Connection, headers: &HeaderMap) -> Result<Account> {
    let token = util::extract_bearer_token(headers).ok_or(AppError::Unauthorized)?;
    queries::get_account_by_api_key_hash(conn, &util::hash_api_key(token))?
        .ok_or(AppError::Unauthorized)
}

pub fn router(limits: RateLimitSettings) -> Router<AppState> {
    let strict = Router::new()
        .route("/credits/buy", post(initiate_credits_purchase))
        .layer(rate_limit::strict_layer(limits.strict_rpm));

    let standard = Router::new()
        .route("/credits/balance", get(current_balance))
        .route("/credits/grants", get(grant_history))
        .layer(rate_limit::standard_layer(limits.standard_rpm));

    let relaxed = Router::new()
        .route("/health", get(health))
        .layer(rate_limit::relaxed_layer(limits.relaxed_rpm));

    Router::new().merge(strict).merge(standard).merge(relaxed)
}
