use std::collections::HashMap;

use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::{msg, AppError, Result};
use crate::models::{CreditPack, CREDITS_PURCHASE_KIND};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Deserialize)]
pub struct StripeConfig {
    pub secret_key: String,
    pub webhook_secret: String,
}

#[derive(Debug, Deserialize)]
struct CreateCheckoutSessionResponse {
    id: String,
    url: String,
}

#[derive(Debug, Clone)]
pub struct StripeClient {
    client: Client,
    secret_key: String,
    webhook_secret: String,
}

/// Build the form parameters for a credits checkout session.
///
/// The grant facts (`kind`, `account_id`, `credits`, `usd`) are attached to
/// BOTH the session metadata and the payment intent metadata: depending on
/// which webhook event arrives first, either object may be the only one
/// surfaced, and each must carry enough to reconstruct the grant.
pub fn checkout_form(
    account_id: &str,
    pack: CreditPack,
    success_url: &str,
    cancel_url: &str,
) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("mode", "payment".to_string()),
        ("success_url", success_url.to_string()),
        ("cancel_url", cancel_url.to_string()),
        ("line_items[0][price_data][currency]", "usd".to_string()),
        (
            "line_items[0][price_data][unit_amount]",
            pack.price_cents().to_string(),
        ),
        (
            "line_items[0][price_data][product_data][name]",
            pack.description(),
        ),
        ("line_items[0][quantity]", "1".to_string()),
    ];

    for (kind_key, account_key, credits_key, usd_key) in [
        (
            "metadata[kind]",
            "metadata[account_id]",
            "metadata[credits]",
            "metadata[usd]",
        ),
        (
            "payment_intent_data[metadata][kind]",
            "payment_intent_data[metadata][account_id]",
            "payment_intent_data[metadata][credits]",
            "payment_intent_data[metadata][usd]",
        ),
    ] {
        params.push((kind_key, CREDITS_PURCHASE_KIND.to_string()));
        params.push((account_key, account_id.to_string()));
        params.push((credits_key, pack.credits().to_string()));
        params.push((usd_key, pack.usd().to_string()));
    }

    params
}

impl StripeClient {
    pub fn new(config: &StripeConfig) -> Self {
        Self {
            client: Client::new(),
            secret_key: config.secret_key.clone(),
            webhook_secret: config.webhook_secret.clone(),
        }
    }

    /// Create a Stripe checkout session for a credit pack.
    ///
    /// Uses an ad-hoc `price_data` line item priced from the pack: packs are
    /// fixed in code, so there are no dashboard price objects to reference.
    /// Returns the session id and the hosted payment page URL.
    pub async fn create_credits_checkout(
        &self,
        account_id: &str,
        pack: CreditPack,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<(String, String)> {
        let params = checkout_form(account_id, pack, success_url, cancel_url);

        let response = self
            .client
            .post("https://api.stripe.com/v1/checkout/sessions")
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&params)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Stripe API error: {}", e)))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Internal(format!(
                "Stripe API error: {}",
                error_text
            )));
        }

        let session: CreateCheckoutSessionResponse = response
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to parse Stripe response: {}", e)))?;

        Ok((session.id, session.url))
    }

    /// Fetch a payment intent by id.
    ///
    /// Used by the webhook fallback path when a charge event arrives without
    /// grant metadata of its own: the intent is the object our checkout
    /// attached the metadata to.
    pub async fn get_payment_intent(&self, payment_intent_id: &str) -> Result<StripePaymentIntent> {
        let response = self
            .client
            .get(format!(
                "https://api.stripe.com/v1/payment_intents/{}",
                payment_intent_id
            ))
            .basic_auth(&self.secret_key, None::<&str>)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Stripe API error: {}", e)))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Internal(format!(
                "Stripe API error: {}",
                error_text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to parse payment intent: {}", e)))
    }

    /// Maximum age of a webhook timestamp before it's rejected (in seconds).
    /// Stripe recommends 300 seconds (5 minutes).
    const WEBHOOK_TIMESTAMP_TOLERANCE_SECS: i64 = 300;

    pub fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> Result<bool> {
        // Stripe signature format: t=timestamp,v1=signature
        let parts: Vec<&str> = signature.split(',').collect();

        let mut timestamp = None;
        let mut sig_v1 = None;

        for part in parts {
            if let Some(t) = part.strip_prefix("t=") {
                timestamp = Some(t);
            } else if let Some(s) = part.strip_prefix("v1=") {
                sig_v1 = Some(s);
            }
        }

        let timestamp_str =
            timestamp.ok_or_else(|| AppError::BadRequest(msg::INVALID_SIGNATURE_FORMAT.into()))?;
        let sig_v1 =
            sig_v1.ok_or_else(|| AppError::BadRequest(msg::INVALID_SIGNATURE_FORMAT.into()))?;

        // Parse and validate timestamp to prevent replay attacks.
        // Reject webhooks older than WEBHOOK_TIMESTAMP_TOLERANCE_SECS.
        let timestamp: i64 = timestamp_str
            .parse()
            .map_err(|_| AppError::BadRequest(msg::INVALID_TIMESTAMP_IN_SIGNATURE.into()))?;

        let now = chrono::Utc::now().timestamp();
        let age = now - timestamp;

        if age > Self::WEBHOOK_TIMESTAMP_TOLERANCE_SECS {
            tracing::warn!(
                "Stripe webhook rejected: timestamp too old (age={}s, max={}s)",
                age,
                Self::WEBHOOK_TIMESTAMP_TOLERANCE_SECS
            );
            return Ok(false);
        }

        // Also reject timestamps from the future (clock skew tolerance: 60 seconds)
        if age < -60 {
            tracing::warn!(
                "Stripe webhook rejected: timestamp in the future (age={}s)",
                age
            );
            return Ok(false);
        }

        // Construct signed payload
        let signed_payload = format!("{}.{}", timestamp_str, String::from_utf8_lossy(payload));

        // Compute expected signature
        let mut mac = HmacSha256::new_from_slice(self.webhook_secret.as_bytes())
            .map_err(|_| AppError::Internal(msg::INVALID_WEBHOOK_SECRET.into()))?;
        mac.update(signed_payload.as_bytes());
        let expected = hex::encode(mac.finalize().into_bytes());

        // Constant-time comparison: response-time differences would otherwise
        // let an attacker discover the correct signature byte-by-byte.
        let expected_bytes = expected.as_bytes();
        let provided_bytes = sig_v1.as_bytes();

        // Length check is not constant-time, but signature length is not
        // secret (always 64 hex chars for SHA-256)
        if expected_bytes.len() != provided_bytes.len() {
            return Ok(false);
        }

        Ok(expected_bytes.ct_eq(provided_bytes).into())
    }
}

/// Generic Stripe webhook event - object is parsed based on event_type
#[derive(Debug, Deserialize)]
pub struct StripeWebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

/// String-valued metadata map carried by Stripe objects.
/// Stripe serializes all metadata values as strings.
pub type StripeMetadata = HashMap<String, String>;

// ============ checkout.session.completed ============

#[derive(Debug, Deserialize)]
pub struct StripeCheckoutSession {
    pub id: String,
    pub payment_status: String,
    /// Payment intent backing this session. The canonical grant reference;
    /// absent in rare flows, in which case the session id stands in.
    pub payment_intent: Option<String>,
    #[serde(default)]
    pub metadata: StripeMetadata,
}

// ============ payment_intent.succeeded ============

#[derive(Debug, Deserialize)]
pub struct StripePaymentIntent {
    pub id: String,
    pub amount: Option<i64>,
    #[serde(default)]
    pub metadata: StripeMetadata,
}

// ============ charge.succeeded ============

#[derive(Debug, Deserialize)]
pub struct StripeCharge {
    pub id: String,
    pub payment_intent: Option<String>,
    #[serde(default)]
    pub metadata: StripeMetadata,
}
