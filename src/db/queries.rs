use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;
use crate::id::EntityType;
use crate::models::*;

use super::from_row::{query_all, query_one, FromRow, ACCOUNT_COLS, LEDGER_ENTRY_COLS};

fn now() -> i64 {
    Utc::now().timestamp()
}

// ============ Accounts ============

pub fn create_account(
    conn: &Connection,
    input: &CreateAccount,
    api_key_hash: &str,
) -> Result<Account> {
    let id = EntityType::Account.gen_id();
    let created_at = now();

    conn.execute(
        "INSERT INTO accounts (id, display_name, api_key_hash, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![&id, &input.display_name, api_key_hash, created_at],
    )?;

    Ok(Account {
        id,
        display_name: input.display_name.clone(),
        api_key_hash: api_key_hash.to_string(),
        created_at,
    })
}

pub fn get_account_by_id(conn: &Connection, id: &str) -> Result<Option<Account>> {
    query_one(
        conn,
        &format!("SELECT {} FROM accounts WHERE id = ?1", ACCOUNT_COLS),
        &[&id],
    )
}

pub fn get_account_by_api_key_hash(conn: &Connection, hash: &str) -> Result<Option<Account>> {
    query_one(
        conn,
        &format!("SELECT {} FROM accounts WHERE api_key_hash = ?1", ACCOUNT_COLS),
        &[&hash],
    )
}

pub fn count_accounts(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM accounts", [], |row| row.get(0))
        .map_err(Into::into)
}

// ============ Credits Ledger ============

/// Outcome of a ledger insert attempt.
#[derive(Debug)]
pub enum LedgerInsert {
    /// New entry written; the confirmation row is returned.
    Inserted(LedgerEntry),
    /// An entry with this reference_id already exists. The grant was
    /// already applied; the caller must not touch the balance.
    Duplicate,
    /// The insert reported success but returned no confirmation row.
    /// The caller must not touch the balance.
    Unconfirmed,
}

/// Append a grant to the ledger, keyed by the unique external reference.
///
/// The UNIQUE constraint on reference_id is enforced atomically by SQLite:
/// two concurrent inserts of the same reference yield exactly one
/// `Inserted` and one `Duplicate`, never two successes.
pub fn insert_ledger_entry(conn: &Connection, input: &CreateLedgerEntry) -> Result<LedgerInsert> {
    let id = EntityType::LedgerEntry.gen_id();

    let result = conn.query_row(
        &format!(
            "INSERT INTO ledger_entries (id, reference_id, account_id, amount, reason, metadata, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             RETURNING {}",
            LEDGER_ENTRY_COLS
        ),
        params![
            &id,
            &input.reference_id,
            &input.account_id,
            input.amount,
            input.reason.as_str(),
            &input.metadata,
            now(),
        ],
        LedgerEntry::from_row,
    );

    match result {
        Ok(entry) => Ok(LedgerInsert::Inserted(entry)),
        Err(rusqlite::Error::SqliteFailure(e, _))
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            Ok(LedgerInsert::Duplicate)
        }
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(LedgerInsert::Unconfirmed),
        Err(e) => Err(e.into()),
    }
}

pub fn get_ledger_entry_by_reference(
    conn: &Connection,
    reference_id: &str,
) -> Result<Option<LedgerEntry>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM ledger_entries WHERE reference_id = ?1",
            LEDGER_ENTRY_COLS
        ),
        &[&reference_id],
    )
}

pub fn list_ledger_entries_for_account(
    conn: &Connection,
    account_id: &str,
    limit: i64,
) -> Result<Vec<LedgerEntry>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM ledger_entries WHERE account_id = ?1
             ORDER BY created_at DESC, id DESC LIMIT ?2",
            LEDGER_ENTRY_COLS
        ),
        &[&account_id, &limit],
    )
}

/// Sum of all grants for an account, straight from the source of truth.
pub fn ledger_sum_for_account(conn: &Connection, account_id: &str) -> Result<i64> {
    conn.query_row(
        "SELECT COALESCE(SUM(amount), 0) FROM ledger_entries WHERE account_id = ?1",
        params![account_id],
        |row| row.get(0),
    )
    .map_err(Into::into)
}

// ============ Balance Projection ============

/// Current projected balance. A missing row means no grants have been
/// applied yet: balance 0, not an error.
pub fn get_balance(conn: &Connection, account_id: &str) -> Result<i64> {
    let credits: Option<i64> = conn
        .query_row(
            "SELECT credits FROM balances WHERE account_id = ?1",
            params![account_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(credits.unwrap_or(0))
}

/// Atomically add credits to an account's balance, creating the row if
/// absent. The increment happens inside the storage engine, so two grants
/// for the same account landing concurrently cannot lose an update.
/// Returns the new balance.
pub fn increment_balance(conn: &Connection, account_id: &str, amount: i64) -> Result<i64> {
    conn.query_row(
        "INSERT INTO balances (account_id, credits) VALUES (?1, ?2)
         ON CONFLICT(account_id) DO UPDATE SET credits = credits + excluded.credits
         RETURNING credits",
        params![account_id, amount],
        |row| row.get(0),
    )
    .map_err(Into::into)
}

/// Rewrite every account's balance from its ledger sum.
///
/// This is the recovery path for the partial-failure state where a grant
/// landed in the ledger but the balance update failed: the ledger is the
/// source of truth, the balance only a projection. Balances whose account
/// has no ledger rows are reset to zero. Returns the number of corrected
/// rows.
pub fn recompute_balances(conn: &Connection) -> Result<usize> {
    let corrected = conn.execute(
        "INSERT INTO balances (account_id, credits)
         SELECT account_id, SUM(amount) FROM ledger_entries GROUP BY account_id
         ON CONFLICT(account_id) DO UPDATE SET credits = excluded.credits
         WHERE credits <> excluded.credits",
        [],
    )?;

    let zeroed = conn.execute(
        "UPDATE balances SET credits = 0
         WHERE credits <> 0
           AND account_id NOT IN (SELECT DISTINCT account_id FROM ledger_entries)",
        [],
    )?;

    Ok(corrected + zeroed)
}
