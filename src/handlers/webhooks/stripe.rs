//! Stripe webhook intake.
//!
//! Verifies the signature against the raw request body BEFORE any parsing -
//! the signature covers the exact bytes on the wire, and a tampered payload
//! must be rejected before any storage access. Acks are emitted only after
//! the reconciliation work for the event has completed, so a crash
//! mid-processing makes Stripe redeliver.
//!
//! Response contract: 200 acks everything handled (including "already
//! processed" and "not ours"), 400 rejects permanently (bad signature,
//! unparseable payload), 5xx asks Stripe to redeliver.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};

use crate::db::AppState;
use crate::models::CREDITS_PURCHASE_KIND;
use crate::payments::{
    StripeCharge, StripeCheckoutSession, StripeMetadata, StripePaymentIntent, StripeWebhookEvent,
};

use super::reconcile::{self, GrantFacts, GrantOutcome};

/// Result type for webhook operations.
pub type WebhookResult = (StatusCode, &'static str);

/// Parsed webhook event, reduced to what the reconciliation engine needs.
#[derive(Debug)]
pub enum GrantEvent {
    /// The event carried complete grant facts.
    Grant(GrantFacts),
    /// A charge completed but its metadata lacks the grant facts; they must
    /// be recovered from the backing payment intent via the Stripe API.
    NeedsIntentLookup { payment_intent: String },
    /// Event type or payload not relevant to credits.
    Ignored,
}

/// Extract grant facts from a metadata map, keyed to the given external
/// reference. Returns None when the event is not a credits purchase or any
/// required field is missing or non-positive - such events are simply not
/// ours, not errors.
pub fn extract_grant_facts(metadata: &StripeMetadata, reference_id: &str) -> Option<GrantFacts> {
    if metadata.get("kind").map(String::as_str) != Some(CREDITS_PURCHASE_KIND) {
        return None;
    }

    let account_id = metadata.get("account_id").filter(|s| !s.is_empty())?;
    let credits: i64 = metadata.get("credits")?.parse().ok()?;
    if credits <= 0 || reference_id.is_empty() {
        return None;
    }

    let usd = metadata.get("usd").and_then(|s| s.parse().ok());

    Some(GrantFacts {
        account_id: account_id.clone(),
        credits,
        reference_id: reference_id.to_string(),
        usd,
    })
}

fn extract_signature(headers: &HeaderMap) -> Result<String, WebhookResult> {
    headers
        .get("stripe-signature")
        .ok_or((StatusCode::BAD_REQUEST, "Missing stripe-signature header"))?
        .to_str()
        .map(|s| s.to_string())
        .map_err(|e| {
            tracing::debug!("Invalid UTF-8 in Stripe signature header: {}", e);
            (StatusCode::BAD_REQUEST, "Invalid signature header")
        })
}

fn parse_event(body: &Bytes) -> Result<GrantEvent, WebhookResult> {
    let event: StripeWebhookEvent = serde_json::from_slice(body).map_err(|e| {
        tracing::error!("Failed to parse Stripe webhook: {}", e);
        (StatusCode::BAD_REQUEST, "Invalid JSON")
    })?;

    match event.event_type.as_str() {
        "checkout.session.completed" => parse_checkout_completed(&event),
        "payment_intent.succeeded" => parse_payment_succeeded(&event),
        "charge.succeeded" => parse_charge_succeeded(&event),
        _ => Ok(GrantEvent::Ignored),
    }
}

fn parse_checkout_completed(event: &StripeWebhookEvent) -> Result<GrantEvent, WebhookResult> {
    let session: StripeCheckoutSession = serde_json::from_value(event.data.object.clone())
        .map_err(|e| {
            tracing::error!("Failed to parse checkout session: {}", e);
            (StatusCode::BAD_REQUEST, "Invalid checkout session")
        })?;

    if session.payment_status != "paid" {
        return Ok(GrantEvent::Ignored);
    }

    // The payment intent is the canonical reference: the other event types
    // for the same purchase resolve to it, so the ledger's unique constraint
    // deduplicates across event types as well as across redeliveries.
    let reference_id = session.payment_intent.unwrap_or(session.id);

    Ok(match extract_grant_facts(&session.metadata, &reference_id) {
        Some(facts) => GrantEvent::Grant(facts),
        None => GrantEvent::Ignored,
    })
}

fn parse_payment_succeeded(event: &StripeWebhookEvent) -> Result<GrantEvent, WebhookResult> {
    let intent: StripePaymentIntent =
        serde_json::from_value(event.data.object.clone()).map_err(|e| {
            tracing::error!("Failed to parse payment intent: {}", e);
            (StatusCode::BAD_REQUEST, "Invalid payment intent")
        })?;

    Ok(match extract_grant_facts(&intent.metadata, &intent.id) {
        Some(facts) => GrantEvent::Grant(facts),
        None => GrantEvent::Ignored,
    })
}

fn parse_charge_succeeded(event: &StripeWebhookEvent) -> Result<GrantEvent, WebhookResult> {
    let charge: StripeCharge = serde_json::from_value(event.data.object.clone()).map_err(|e| {
        tracing::error!("Failed to parse charge: {}", e);
        (StatusCode::BAD_REQUEST, "Invalid charge")
    })?;

    // A charge without a payment intent cannot be one of our checkouts.
    let Some(payment_intent) = charge.payment_intent else {
        return Ok(GrantEvent::Ignored);
    };

    // Charges usually echo the intent's metadata; when they don't, the facts
    // are recovered from the intent itself by a secondary lookup.
    Ok(match extract_grant_facts(&charge.metadata, &payment_intent) {
        Some(facts) => GrantEvent::Grant(facts),
        None => GrantEvent::NeedsIntentLookup { payment_intent },
    })
}

async fn process_stripe_webhook(
    state: &AppState,
    headers: &HeaderMap,
    body: &Bytes,
) -> Result<WebhookResult, WebhookResult> {
    let signature = extract_signature(headers)?;

    match state.stripe.verify_webhook_signature(body, &signature) {
        Ok(true) => {}
        Ok(false) => return Err((StatusCode::BAD_REQUEST, "Invalid signature")),
        Err(e) => {
            tracing::debug!("Signature verification rejected: {}", e);
            return Err((StatusCode::BAD_REQUEST, "Invalid signature header"));
        }
    }

    let facts = match parse_event(body)? {
        GrantEvent::Grant(facts) => facts,
        GrantEvent::NeedsIntentLookup { payment_intent } => {
            let intent = state
                .stripe
                .get_payment_intent(&payment_intent)
                .await
                .map_err(|e| {
                    // 5xx: Stripe redelivers and the lookup is retried.
                    tracing::error!("Payment intent lookup failed for {}: {}", payment_intent, e);
                    (StatusCode::INTERNAL_SERVER_ERROR, "Payment lookup failed")
                })?;

            match extract_grant_facts(&intent.metadata, &intent.id) {
                Some(facts) => facts,
                None => return Ok((StatusCode::OK, "Event ignored")),
            }
        }
        GrantEvent::Ignored => return Ok((StatusCode::OK, "Event ignored")),
    };

    let conn = state.db.get().map_err(|e| {
        tracing::error!("DB connection error: {}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Database error")
    })?;

    match reconcile::apply_grant(&conn, &facts)? {
        GrantOutcome::Applied { .. } => Ok((StatusCode::OK, "OK")),
        GrantOutcome::AlreadyProcessed => Ok((StatusCode::OK, "Already processed")),
        GrantOutcome::BalanceStale => Ok((
            StatusCode::OK,
            "Grant recorded; balance pending reconciliation",
        )),
    }
}

/// Axum handler for Stripe webhooks.
pub async fn handle_stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    process_stripe_webhook(&state, &headers, &body)
        .await
        .unwrap_or_else(|e| e)
}
