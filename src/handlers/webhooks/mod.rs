pub mod reconcile;
pub mod stripe;

pub use stripe::handle_stripe_webhook;

use axum::{routing::post, Router};

use crate::db::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/webhook/stripe", post(handle_stripe_webhook))
}
