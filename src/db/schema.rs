use rusqlite::Connection;

/// Initialize the database schema.
///
/// The ledger is append-heavy, so the database runs in WAL mode with
/// NORMAL synchronous writes and a bounded journal.
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA wal_autocheckpoint = 1000;
        PRAGMA journal_size_limit = 67108864;

        -- Accounts (storefront users holding credits)
        CREATE TABLE IF NOT EXISTS accounts (
            id TEXT PRIMARY KEY,
            display_name TEXT NOT NULL,
            api_key_hash TEXT NOT NULL UNIQUE,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_accounts_api_key ON accounts(api_key_hash);

        -- Credits ledger (append-only, audit-grade)
        -- reference_id is the external payment reference and the idempotency
        -- key: the UNIQUE constraint is what makes a duplicate webhook
        -- delivery a no-op instead of a double grant.
        CREATE TABLE IF NOT EXISTS ledger_entries (
            id TEXT PRIMARY KEY,
            reference_id TEXT NOT NULL UNIQUE,
            account_id TEXT NOT NULL REFERENCES accounts(id),
            amount INTEGER NOT NULL CHECK (amount > 0),
            reason TEXT NOT NULL CHECK (reason IN ('purchase', 'adjustment')),
            metadata TEXT,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_ledger_account_time ON ledger_entries(account_id, created_at DESC);

        -- Balance projection (denormalized; derived from the ledger)
        -- Mutated only by the reconciliation engine and the sweep.
        CREATE TABLE IF NOT EXISTS balances (
            account_id TEXT PRIMARY KEY REFERENCES accounts(id),
            credits INTEGER NOT NULL DEFAULT 0 CHECK (credits >= 0)
        );
        "#,
    )?;
    Ok(())
}
