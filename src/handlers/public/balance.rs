use axum::extract::State;
use axum::http::HeaderMap;
use serde::Serialize;

use crate::db::{queries, AppState};
use crate::error::Result;
use crate::extractors::Json;
use crate::models::LedgerEntry;

use super::authenticate_account;

/// Grant history page size. The ledger grows without bound; reads are capped.
const GRANT_HISTORY_LIMIT: i64 = 100;

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub account_id: String,
    pub credits: i64,
}

/// Current projected balance for the calling account.
pub async fn current_balance(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<BalanceResponse>> {
    let conn = state.db.get()?;
    let account = authenticate_account(&conn, &headers)?;
    let credits = queries::get_balance(&conn, &account.id)?;

    Ok(Json(BalanceResponse {
        account_id: account.id,
        credits,
    }))
}

#[derive(Debug, Serialize)]
pub struct GrantHistoryResponse {
    pub account_id: String,
    pub grants: Vec<LedgerEntry>,
}

/// The calling account's ledger history, most recent first.
pub async fn grant_history(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<GrantHistoryResponse>> {
    let conn = state.db.get()?;
    let account = authenticate_account(&conn, &headers)?;
    let grants =
        queries::list_ledger_entries_for_account(&conn, &account.id, GRANT_HISTORY_LIMIT)?;

    Ok(Json(GrantHistoryResponse {
        account_id: account.id,
        grants,
    }))
}
