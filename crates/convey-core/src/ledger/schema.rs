//! SQLite schema for the points ledger.
//!
//! Tables:
//! - `accounts`: member identities, permission masks and balances
//! - `products`: store items with price and remaining inventory
//! - `purchases`: append-only purchase log
//!
//! The CHECK constraints carry the ledger invariants (mask range,
//! non-negative balance and quantity) at the storage layer as well as the
//! API layer.

/// DDL for the ledger tables.
///
/// Schema version: 1
pub const LEDGER_SCHEMA: &str = r#"
-- Member accounts (account_id is immutable once created)
CREATE TABLE IF NOT EXISTS accounts (
    account_id      INTEGER PRIMARY KEY AUTOINCREMENT,
    external_id     INTEGER NOT NULL UNIQUE,
    password_hash   TEXT NOT NULL,
    permission_mask INTEGER NOT NULL DEFAULT 0
                        CHECK (permission_mask BETWEEN 0 AND 15),
    enabled         INTEGER NOT NULL DEFAULT 1,
    balance         INTEGER NOT NULL DEFAULT 0 CHECK (balance >= 0),
    created_at      TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Store items
CREATE TABLE IF NOT EXISTS products (
    product_id      INTEGER PRIMARY KEY AUTOINCREMENT,
    name            TEXT NOT NULL,
    price           INTEGER NOT NULL CHECK (price >= 0),
    quantity        INTEGER NOT NULL DEFAULT 0 CHECK (quantity >= 0),
    enabled         INTEGER NOT NULL DEFAULT 1
);

-- Purchase log (append-only, never mutated or deleted)
CREATE TABLE IF NOT EXISTS purchases (
    record_id       INTEGER PRIMARY KEY AUTOINCREMENT,
    order_id        TEXT NOT NULL UNIQUE,
    account_id      INTEGER NOT NULL REFERENCES accounts(account_id),
    product_id      INTEGER NOT NULL REFERENCES products(product_id),
    price_paid      INTEGER NOT NULL,
    created_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_purchases_account_id
    ON purchases(account_id);
CREATE INDEX IF NOT EXISTS idx_purchases_product_id
    ON purchases(product_id);
"#;
