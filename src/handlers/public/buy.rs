use axum::extract::State;
use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};

use crate::db::AppState;
use crate::error::{msg, AppError, Result};
use crate::extractors::Json;
use crate::models::CreditPack;

use super::authenticate_account;

#[derive(Debug, Deserialize)]
pub struct BuyCreditsRequest {
    /// Requested pack size in whole US dollars. Must be one of the offered
    /// packs; arbitrary amounts are rejected.
    pub usd: i64,
}

#[derive(Debug, Serialize)]
pub struct BuyCreditsResponse {
    /// Hosted payment page to redirect the buyer to.
    pub checkout_url: String,
    /// Credits this pack grants once the payment completes.
    pub credits: i64,
    pub usd: i64,
}

/// Start a credits purchase: validate the pack, create a Stripe checkout
/// session carrying the grant facts as metadata, and hand back the redirect
/// URL.
///
/// Nothing is written locally. The grant is applied entirely by the webhook
/// path once the payment completes; an abandoned checkout leaves no residue.
pub async fn initiate_credits_purchase(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<BuyCreditsRequest>,
) -> Result<Json<BuyCreditsResponse>> {
    let conn = state.db.get()?;
    let account = authenticate_account(&conn, &headers)?;
    drop(conn);

    let pack = CreditPack::from_usd(request.usd)
        .ok_or_else(|| AppError::BadRequest(msg::INVALID_CREDIT_PACK.into()))?;

    let (_, checkout_url) = state
        .stripe
        .create_credits_checkout(&account.id, pack, &state.success_url, &state.cancel_url)
        .await?;

    tracing::info!(
        "Checkout created: account={}, usd={}, credits={}",
        account.id,
        pack.usd(),
        pack.credits()
    );

    Ok(Json(BuyCreditsResponse {
        checkout_url,
        credits: pack.credits(),
        usd: pack.usd(),
    }))
}
