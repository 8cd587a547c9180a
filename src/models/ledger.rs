use serde::{Deserialize, Serialize};

/// One credit grant in the append-only ledger.
///
/// `reference_id` carries the external payment reference (Stripe payment
/// intent id) and is globally unique: it is the idempotency key that makes
/// grant application safe under at-least-once webhook delivery. Entries are
/// never updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: String,
    pub reference_id: String,
    pub account_id: String,
    /// Credits granted. Always positive; the ledger records grants only.
    pub amount: i64,
    pub reason: GrantReason,
    /// Audit payload (JSON): amount paid in minor currency units, the USD
    /// pack size, the raw external id.
    pub metadata: Option<String>,
    pub created_at: i64,
}

/// Data required to create a new ledger entry
#[derive(Debug, Clone)]
pub struct CreateLedgerEntry {
    pub reference_id: String,
    pub account_id: String,
    pub amount: i64,
    pub reason: GrantReason,
    pub metadata: Option<String>,
}

/// Why a ledger entry exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantReason {
    /// Completed fiat purchase reconciled from a payment webhook
    Purchase,
    /// Manually applied credit (dev seed, support adjustments)
    Adjustment,
}

impl GrantReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Purchase => "purchase",
            Self::Adjustment => "adjustment",
        }
    }
}

impl std::str::FromStr for GrantReason {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "purchase" => Ok(Self::Purchase),
            "adjustment" => Ok(Self::Adjustment),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for GrantReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
