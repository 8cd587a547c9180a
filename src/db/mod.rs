mod from_row;
pub mod queries;
mod schema;

pub use from_row::FromRow;
pub use schema::init_db;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::payments::StripeClient;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Application state holding the database pool and configuration
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    /// Stripe API client, shared across handlers (checkout creation,
    /// webhook signature verification, payment-intent lookups)
    pub stripe: StripeClient,
    /// Base URL for callbacks (e.g., https://api.example.com)
    pub base_url: String,
    pub success_url: String,
    pub cancel_url: String,
}

pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path);
    Pool::builder().max_size(10).build(manager)
}
