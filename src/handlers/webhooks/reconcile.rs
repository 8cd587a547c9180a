//! Reconciliation engine: one verified payment event in, at most one ledger
//! grant and a consistent balance update out.
//!
//! The ledger insert is the idempotency boundary. Its unique reference_id
//! constraint tolerates the same webhook event being delivered any number of
//! times, sequentially or overlapping: exactly one delivery wins the insert,
//! every other lands on the duplicate path and leaves the balance alone.

use axum::http::StatusCode;
use rusqlite::Connection;

use crate::db::queries::{self, LedgerInsert};
use crate::models::{CreateLedgerEntry, GrantReason};

use super::stripe::WebhookResult;

/// Normalized grant facts extracted from a payment event's metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantFacts {
    pub account_id: String,
    pub credits: i64,
    /// External payment reference (payment intent id). The idempotency key.
    pub reference_id: String,
    /// USD pack size, when the metadata carried it. Audit only.
    pub usd: Option<i64>,
}

/// Outcome of applying a grant.
#[derive(Debug)]
pub enum GrantOutcome {
    /// New grant: ledger entry written, balance updated.
    Applied { balance: i64 },
    /// The reference was already in the ledger. Correct no-op.
    AlreadyProcessed,
    /// Ledger entry written but the balance update failed. The grant is
    /// durable; the projection is stale until the reconciliation sweep
    /// rewrites it from ledger sums.
    BalanceStale,
}

/// Apply a grant to the ledger and balance. Order matters:
///
/// 1. Ledger insert keyed by the unique reference - duplicate means already
///    processed, stop without touching the balance.
/// 2. Atomic balance increment (insert-if-absent; a missing row is balance
///    zero, not an error).
///
/// A failure between the two steps leaves the ledger as source of truth and
/// the balance stale - recoverable by `queries::recompute_balances`, never
/// by an in-request retry (which would re-enter through the duplicate path).
pub fn apply_grant(conn: &Connection, facts: &GrantFacts) -> Result<GrantOutcome, WebhookResult> {
    let metadata = serde_json::json!({
        "reference_id": facts.reference_id,
        "usd": facts.usd,
        "amount_cents": facts.usd.map(|u| u * 100),
    });

    let entry = CreateLedgerEntry {
        reference_id: facts.reference_id.clone(),
        account_id: facts.account_id.clone(),
        amount: facts.credits,
        reason: GrantReason::Purchase,
        metadata: Some(metadata.to_string()),
    };

    match queries::insert_ledger_entry(conn, &entry) {
        Ok(LedgerInsert::Inserted(_)) => {}
        Ok(LedgerInsert::Duplicate) => return Ok(GrantOutcome::AlreadyProcessed),
        Ok(LedgerInsert::Unconfirmed) => {
            // No confirmation row: do not touch the balance. An under-credited
            // state is auditable from the ledger; an over-credited one is not.
            tracing::error!(
                "Ledger insert unconfirmed: reference={}, account={}",
                facts.reference_id,
                facts.account_id
            );
            return Err((StatusCode::INTERNAL_SERVER_ERROR, "Ledger insert unconfirmed"));
        }
        Err(e) => {
            tracing::error!(
                "Ledger insert failed: reference={}, account={}: {}",
                facts.reference_id,
                facts.account_id,
                e
            );
            return Err((StatusCode::INTERNAL_SERVER_ERROR, "Database error"));
        }
    }

    match queries::increment_balance(conn, &facts.account_id, facts.credits) {
        Ok(balance) => {
            tracing::info!(
                "Credits granted: account={}, credits={}, reference={}, balance={}",
                facts.account_id,
                facts.credits,
                facts.reference_id,
                balance
            );
            Ok(GrantOutcome::Applied { balance })
        }
        Err(e) => {
            tracing::error!(
                "Balance update failed after ledger insert: account={}, reference={}, credits={}: {} \
                 - balance is stale until the reconciliation sweep runs",
                facts.account_id,
                facts.reference_id,
                facts.credits,
                e
            );
            Ok(GrantOutcome::BalanceStale)
        }
    }
}
