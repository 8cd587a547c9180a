use serde::{Deserialize, Serialize};

/// Conversion rate between whole US dollars and credits.
pub const CREDITS_PER_USD: i64 = 160;

/// Metadata marker identifying a payment as a credits purchase.
///
/// Set on outbound checkout sessions and matched by the webhook
/// reconciliation path; events without it are not ours to process.
pub const CREDITS_PURCHASE_KIND: &str = "credits_purchase";

/// The fixed set of credit packs offered by the storefront.
///
/// Pack sizes (and therefore prices and credit amounts) live in code, not in
/// the request: the buyer picks a pack, never an arbitrary amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CreditPack {
    Ten,
    TwentyFive,
    Fifty,
}

impl CreditPack {
    /// Resolve a requested USD amount against the allow-list.
    pub fn from_usd(usd: i64) -> Option<Self> {
        match usd {
            10 => Some(Self::Ten),
            25 => Some(Self::TwentyFive),
            50 => Some(Self::Fifty),
            _ => None,
        }
    }

    /// Pack price in whole US dollars.
    pub fn usd(self) -> i64 {
        match self {
            Self::Ten => 10,
            Self::TwentyFive => 25,
            Self::Fifty => 50,
        }
    }

    /// Pack price in cents, as charged through the payment provider.
    pub fn price_cents(self) -> i64 {
        self.usd() * 100
    }

    /// Credits granted when this pack's payment completes.
    pub fn credits(self) -> i64 {
        self.usd() * CREDITS_PER_USD
    }

    /// Line-item description shown on the hosted checkout page.
    pub fn description(self) -> String {
        format!("{} Cardmint credits", self.credits())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_list_membership() {
        assert_eq!(CreditPack::from_usd(10), Some(CreditPack::Ten));
        assert_eq!(CreditPack::from_usd(25), Some(CreditPack::TwentyFive));
        assert_eq!(CreditPack::from_usd(50), Some(CreditPack::Fifty));

        assert_eq!(CreditPack::from_usd(0), None);
        assert_eq!(CreditPack::from_usd(-25), None);
        assert_eq!(CreditPack::from_usd(17), None);
        assert_eq!(CreditPack::from_usd(100), None);
    }

    #[test]
    fn conversion_rates() {
        assert_eq!(CreditPack::Ten.credits(), 1600);
        assert_eq!(CreditPack::TwentyFive.credits(), 4000);
        assert_eq!(CreditPack::Fifty.credits(), 8000);

        assert_eq!(CreditPack::TwentyFive.price_cents(), 2500);
    }
}
