use std::env;

use crate::payments::StripeConfig;
use crate::rate_limit::RateLimitSettings;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    pub base_url: String,
    /// Where Stripe redirects the buyer after a completed checkout.
    pub success_url: String,
    /// Where Stripe redirects the buyer after an abandoned checkout.
    pub cancel_url: String,
    pub stripe: StripeConfig,
    pub rate_limit: RateLimitSettings,
    /// Interval for the balance reconciliation sweep, in seconds (0 = disabled).
    pub sweep_interval_secs: u64,
    pub dev_mode: bool,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("CARDMINT_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let base_url =
            env::var("BASE_URL").unwrap_or_else(|_| format!("http://{}:{}", host, port));

        let success_url =
            env::var("SUCCESS_URL").unwrap_or_else(|_| format!("{}/success", base_url));
        let cancel_url = env::var("CANCEL_URL").unwrap_or_else(|_| format!("{}/cancel", base_url));

        let stripe = StripeConfig {
            secret_key: required_secret("STRIPE_SECRET_KEY", dev_mode, "sk_test_dev"),
            webhook_secret: required_secret("STRIPE_WEBHOOK_SECRET", dev_mode, "whsec_dev"),
        };

        Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "cardmint.db".to_string()),
            base_url,
            success_url,
            cancel_url,
            stripe,
            rate_limit: RateLimitSettings::from_env(),
            sweep_interval_secs: env::var("RECONCILE_SWEEP_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(300),
            dev_mode,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Read a secret from the environment. In dev mode a placeholder is
/// substituted so the server can start without real Stripe keys.
fn required_secret(name: &str, dev_mode: bool, dev_default: &str) -> String {
    match env::var(name) {
        Ok(v) => v,
        Err(_) if dev_mode => dev_default.to_string(),
        Err(_) => panic!("{} must be set", name),
    }
}
