//! Prefixed ID generation for Cardmint entities.
//!
//! All IDs use a `cm_` brand prefix to guarantee collision avoidance with
//! payment provider IDs (Stripe's `pi_`, `cs_`, `ch_`, etc.).
//!
//! Format: `cm_{entity}_{uuid_simple}` (32 hex chars, no hyphens)

use uuid::Uuid;

/// Entity types that have prefixed IDs in Cardmint.
#[derive(Debug, Clone, Copy)]
pub enum EntityType {
    Account,
    LedgerEntry,
}

impl EntityType {
    /// Returns the prefix for this entity type.
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Account => "cm_acct",
            Self::LedgerEntry => "cm_led",
        }
    }

    /// Generates a new prefixed ID for this entity type.
    pub fn gen_id(&self) -> String {
        format!("{}_{}", self.prefix(), Uuid::new_v4().as_simple())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_format() {
        let id = EntityType::Account.gen_id();
        assert!(id.starts_with("cm_acct_"));
        // cm_acct_ (8 chars) + 32 hex chars = 40 chars total
        assert_eq!(id.len(), 40);
    }

    #[test]
    fn test_ids_are_unique() {
        let id1 = EntityType::LedgerEntry.gen_id();
        let id2 = EntityType::LedgerEntry.gen_id();
        assert_ne!(id1, id2);
    }
}
