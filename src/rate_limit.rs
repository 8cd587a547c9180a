//! Rate limiting configuration for public endpoints.
//!
//! Rate limits are applied per-IP address to protect against DoS attacks.
//! Limits are enforced by a shared governor keyed on peer IP, not by
//! per-handler mutable maps, so they hold across all routes in a tier.
//!
//! Tiers:
//! - Strict: /credits/buy - external API calls
//! - Standard: /credits/balance, /credits/grants
//! - Relaxed: /health
//!
//! Configure via environment variables:
//! - RATE_LIMIT_STRICT_RPM (default: 10)
//! - RATE_LIMIT_STANDARD_RPM (default: 30)
//! - RATE_LIMIT_RELAXED_RPM (default: 60)

use std::sync::Arc;
use std::time::Duration;
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::GovernorLayer;

/// Per-tier requests-per-minute settings, loaded from the environment.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitSettings {
    pub strict_rpm: u32,
    pub standard_rpm: u32,
    pub relaxed_rpm: u32,
}

impl RateLimitSettings {
    pub fn from_env() -> Self {
        fn rpm(name: &str, default: u32) -> u32 {
            std::env::var(name)
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v| *v > 0)
                .unwrap_or(default)
        }

        Self {
            strict_rpm: rpm("RATE_LIMIT_STRICT_RPM", 10),
            standard_rpm: rpm("RATE_LIMIT_STANDARD_RPM", 30),
            relaxed_rpm: rpm("RATE_LIMIT_RELAXED_RPM", 60),
        }
    }
}

/// Rate limiter layer type alias using governor types directly
pub type RateLimitLayer = GovernorLayer<
    tower_governor::key_extractor::PeerIpKeyExtractor,
    governor::middleware::NoOpMiddleware<governor::clock::QuantaInstant>,
>;

/// Creates a rate limiter layer with the specified requests per minute.
fn create_layer(requests_per_minute: u32) -> RateLimitLayer {
    assert!(requests_per_minute > 0, "Rate limit must be greater than 0");

    let period_secs = 60 / requests_per_minute as u64;
    let config = GovernorConfigBuilder::default()
        .period(Duration::from_secs(period_secs.max(1)))
        .burst_size(requests_per_minute)
        .finish()
        .expect("Failed to build rate limiter config");

    GovernorLayer {
        config: Arc::new(config),
    }
}

/// Creates a rate limiter layer for the strict tier.
/// Used for endpoints that make external API calls (e.g., /credits/buy).
pub fn strict_layer(requests_per_minute: u32) -> RateLimitLayer {
    create_layer(requests_per_minute)
}

/// Creates a rate limiter layer for the standard tier.
/// Used for authenticated read endpoints.
pub fn standard_layer(requests_per_minute: u32) -> RateLimitLayer {
    create_layer(requests_per_minute)
}

/// Creates a rate limiter layer for the relaxed tier.
/// Used for lightweight endpoints like health checks.
pub fn relaxed_layer(requests_per_minute: u32) -> RateLimitLayer {
    create_layer(requests_per_minute)
}
