use serde::{Deserialize, Serialize};

/// A storefront account that can buy and hold credits.
///
/// The API key is never stored; only its hash, which is the lookup key
/// for Bearer authentication on the public endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub display_name: String,
    #[serde(skip_serializing)]
    pub api_key_hash: String,
    pub created_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateAccount {
    pub display_name: String,
}
