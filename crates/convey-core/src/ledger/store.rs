//! LedgerStore: SQLite-backed account, product and purchase state.
//!
//! One shared connection behind a mutex; the handle is cheap to clone.
//! The purchase path runs under `BEGIN IMMEDIATE` so the read-validate-write
//! sequence holds the database write lock for its whole extent: two racing
//! purchases against the same product or account serialize, and the loser
//! re-reads the committed state.

use super::rows::{Account, Product, PurchaseRecord};
use super::schema::LEDGER_SCHEMA;
use convey_auth::{is_valid_mask, PasswordVault};
use rand::distributions::Alphanumeric;
use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

/// Administrative and read-side store errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("account not found: {account_id}")]
    AccountNotFound { account_id: i64 },

    #[error("product not found: {product_id}")]
    ProductNotFound { product_id: i64 },

    #[error("account already exists for external id {external_id}")]
    AccountExists { external_id: i64 },

    #[error("invalid permission mask: {mask}")]
    InvalidMask { mask: u8 },

    #[error("invalid amount: {amount}")]
    InvalidAmount { amount: i64 },

    #[error("database error: {0}")]
    Database(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

/// Purchase-path errors. Every variant except `Database` aborts before any
/// mutation; `Database` aborts with a full rollback.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PurchaseError {
    #[error("account not found: {account_id}")]
    AccountNotFound { account_id: i64 },

    #[error("product not found: {product_id}")]
    ProductNotFound { product_id: i64 },

    #[error("insufficient balance: have {balance}, need {price}")]
    InsufficientBalance { balance: i64, price: i64 },

    #[error("insufficient inventory for product {product_id}")]
    InsufficientInventory { product_id: i64 },

    #[error("database error: {0}")]
    Database(String),
}

impl From<rusqlite::Error> for PurchaseError {
    fn from(e: rusqlite::Error) -> Self {
        PurchaseError::Database(e.to_string())
    }
}

/// SQLite-backed ledger store.
#[derive(Clone)]
pub struct LedgerStore {
    conn: Arc<Mutex<Connection>>,
    vault: PasswordVault,
}

impl LedgerStore {
    /// Open a file-backed store.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::init_connection(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            vault: PasswordVault::new(),
        })
    }

    /// Create an in-memory store (for testing).
    pub fn memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::init_connection(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            vault: PasswordVault::new(),
        })
    }

    /// Create a store from an existing connection (for multi-connection
    /// tests).
    pub fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        Self::init_connection(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            vault: PasswordVault::new(),
        })
    }

    fn init_connection(conn: &Connection) -> Result<(), StoreError> {
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        // WAL mode for file-backed DBs (no-op for in-memory)
        let _ = conn.execute("PRAGMA journal_mode = WAL", []);
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(LEDGER_SCHEMA)?;
        Ok(())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub fn get_account_by_id(&self, account_id: i64) -> Result<Option<Account>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let account = conn
            .query_row(
                "SELECT account_id, external_id, password_hash, permission_mask,
                        enabled, balance, created_at
                 FROM accounts WHERE account_id = ?",
                [account_id],
                map_account,
            )
            .optional()?;
        Ok(account)
    }

    pub fn get_account_by_external_id(
        &self,
        external_id: i64,
    ) -> Result<Option<Account>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let account = conn
            .query_row(
                "SELECT account_id, external_id, password_hash, permission_mask,
                        enabled, balance, created_at
                 FROM accounts WHERE external_id = ?",
                [external_id],
                map_account,
            )
            .optional()?;
        Ok(account)
    }

    pub fn get_product_by_id(&self, product_id: i64) -> Result<Option<Product>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let product = conn
            .query_row(
                "SELECT product_id, name, price, quantity, enabled
                 FROM products WHERE product_id = ?",
                [product_id],
                map_product,
            )
            .optional()?;
        Ok(product)
    }

    /// Purchase records for an account, newest first.
    pub fn purchases_for_account(
        &self,
        account_id: i64,
    ) -> Result<Vec<PurchaseRecord>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT record_id, order_id, account_id, product_id, price_paid, created_at
             FROM purchases WHERE account_id = ?
             ORDER BY record_id DESC",
        )?;
        let records = stmt
            .query_map([account_id], map_purchase)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Count purchase records for a product (for tests and admin views).
    pub fn count_purchases(&self, product_id: i64) -> Result<u32, StoreError> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM purchases WHERE product_id = ?",
            [product_id],
            |row| row.get(0),
        )?;
        Ok(count as u32)
    }

    // =========================================================================
    // Account administration
    // =========================================================================

    /// Create an account for a new member. The account starts with mask 0,
    /// balance 0 and the well-known default password digest.
    pub fn create_account(&self, external_id: i64) -> Result<Account, StoreError> {
        let conn = self.conn.lock().unwrap();
        let inserted = conn.execute(
            "INSERT INTO accounts (external_id, password_hash, created_at)
             VALUES (?1, ?2, ?3)",
            params![
                external_id,
                convey_auth::DEFAULT_PASSWORD_DIGEST,
                super::now_rfc3339()
            ],
        );
        if let Err(e) = inserted {
            if e.to_string().contains("UNIQUE constraint failed") {
                return Err(StoreError::AccountExists { external_id });
            }
            return Err(e.into());
        }
        let account_id = conn.last_insert_rowid();
        tracing::debug!(account_id, external_id, "account created");
        conn.query_row(
            "SELECT account_id, external_id, password_hash, permission_mask,
                    enabled, balance, created_at
             FROM accounts WHERE account_id = ?",
            [account_id],
            map_account,
        )
        .map_err(Into::into)
    }

    /// Idempotent upsert of the bootstrap super account (account id 1,
    /// mask 15). Run at startup; the balance of an existing row is left
    /// alone.
    pub fn ensure_superuser(&self, external_id: i64, password: &str) -> Result<(), StoreError> {
        let digest = self.vault.hash(password);
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO accounts
                 (account_id, external_id, password_hash, permission_mask, enabled, created_at)
             VALUES (1, ?1, ?2, 15, 1, ?3)
             ON CONFLICT(account_id) DO UPDATE SET
                 external_id = excluded.external_id,
                 password_hash = excluded.password_hash,
                 permission_mask = 15,
                 enabled = 1",
            params![external_id, digest, super::now_rfc3339()],
        )?;
        Ok(())
    }

    /// Change an account's password; the plaintext is digested here and
    /// never stored.
    pub fn set_password(&self, account_id: i64, new_password: &str) -> Result<(), StoreError> {
        let digest = self.vault.hash(new_password);
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE accounts SET password_hash = ?1 WHERE account_id = ?2",
            params![digest, account_id],
        )?;
        if changed == 0 {
            return Err(StoreError::AccountNotFound { account_id });
        }
        Ok(())
    }

    /// Set an account's permission mask. Masks failing
    /// [`convey_auth::is_valid_mask`] are rejected before any write.
    pub fn set_permission_mask(&self, account_id: i64, mask: u8) -> Result<(), StoreError> {
        if !is_valid_mask(mask) {
            return Err(StoreError::InvalidMask { mask });
        }
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE accounts SET permission_mask = ?1 WHERE account_id = ?2",
            params![mask, account_id],
        )?;
        if changed == 0 {
            return Err(StoreError::AccountNotFound { account_id });
        }
        tracing::debug!(account_id, mask, "permission mask updated");
        Ok(())
    }

    pub fn set_enabled(&self, account_id: i64, enabled: bool) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE accounts SET enabled = ?1 WHERE account_id = ?2",
            params![enabled as i32, account_id],
        )?;
        if changed == 0 {
            return Err(StoreError::AccountNotFound { account_id });
        }
        Ok(())
    }

    /// Credit points to an account. The only balance mutation outside the
    /// purchase path; amount must be non-negative.
    pub fn credit_balance(&self, account_id: i64, amount: i64) -> Result<(), StoreError> {
        if amount < 0 {
            return Err(StoreError::InvalidAmount { amount });
        }
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE accounts SET balance = balance + ?1 WHERE account_id = ?2",
            params![amount, account_id],
        )?;
        if changed == 0 {
            return Err(StoreError::AccountNotFound { account_id });
        }
        tracing::debug!(account_id, amount, "balance credited");
        Ok(())
    }

    // =========================================================================
    // Product administration
    // =========================================================================

    pub fn create_product(
        &self,
        name: &str,
        price: i64,
        quantity: i64,
    ) -> Result<Product, StoreError> {
        if price < 0 {
            return Err(StoreError::InvalidAmount { amount: price });
        }
        if quantity < 0 {
            return Err(StoreError::InvalidAmount { amount: quantity });
        }
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO products (name, price, quantity) VALUES (?1, ?2, ?3)",
            params![name, price, quantity],
        )?;
        let product_id = conn.last_insert_rowid();
        conn.query_row(
            "SELECT product_id, name, price, quantity, enabled
             FROM products WHERE product_id = ?",
            [product_id],
            map_product,
        )
        .map_err(Into::into)
    }

    /// Add inventory to a product.
    pub fn restock(&self, product_id: i64, amount: i64) -> Result<(), StoreError> {
        if amount < 0 {
            return Err(StoreError::InvalidAmount { amount });
        }
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE products SET quantity = quantity + ?1 WHERE product_id = ?2",
            params![amount, product_id],
        )?;
        if changed == 0 {
            return Err(StoreError::ProductNotFound { product_id });
        }
        Ok(())
    }

    pub fn set_product_enabled(&self, product_id: i64, enabled: bool) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE products SET enabled = ?1 WHERE product_id = ?2",
            params![enabled as i32, product_id],
        )?;
        if changed == 0 {
            return Err(StoreError::ProductNotFound { product_id });
        }
        Ok(())
    }

    // =========================================================================
    // Purchase
    // =========================================================================

    /// Atomically purchase one unit of `product_id` for `account_id`.
    ///
    /// Debit, decrement and the purchase record commit as one unit or not at
    /// all. Validation failures abort before any mutation; a storage failure
    /// after validation rolls everything back.
    pub fn purchase(
        &self,
        account_id: i64,
        product_id: i64,
    ) -> Result<PurchaseRecord, PurchaseError> {
        let conn = self.conn.lock().unwrap();

        // BEGIN IMMEDIATE acquires the write lock up front, so the
        // read-validate-write below is serialized across connections too.
        conn.execute("BEGIN IMMEDIATE", [])?;

        let result = Self::purchase_inner(&conn, account_id, product_id);

        match &result {
            Ok(record) => {
                conn.execute("COMMIT", [])?;
                tracing::debug!(
                    account_id,
                    product_id,
                    order_id = %record.order_id,
                    price = record.price_paid,
                    "purchase committed"
                );
            }
            Err(e) => {
                let _ = conn.execute("ROLLBACK", []);
                tracing::debug!(account_id, product_id, error = %e, "purchase aborted");
            }
        }

        result
    }

    fn purchase_inner(
        conn: &Connection,
        account_id: i64,
        product_id: i64,
    ) -> Result<PurchaseRecord, PurchaseError> {
        let balance: Option<i64> = conn
            .query_row(
                "SELECT balance FROM accounts WHERE account_id = ?",
                [account_id],
                |row| row.get(0),
            )
            .optional()?;
        let balance = balance.ok_or(PurchaseError::AccountNotFound { account_id })?;

        let product: Option<(i64, i64)> = conn
            .query_row(
                "SELECT price, quantity FROM products WHERE product_id = ?",
                [product_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let (price, quantity) = product.ok_or(PurchaseError::ProductNotFound { product_id })?;

        if balance < price {
            return Err(PurchaseError::InsufficientBalance { balance, price });
        }
        if quantity <= 0 {
            return Err(PurchaseError::InsufficientInventory { product_id });
        }

        conn.execute(
            "UPDATE accounts SET balance = balance - ?1 WHERE account_id = ?2",
            params![price, account_id],
        )?;
        conn.execute(
            "UPDATE products SET quantity = quantity - 1 WHERE product_id = ?",
            [product_id],
        )?;

        let order_id = new_order_id();
        let created_at = super::now_rfc3339();
        conn.execute(
            "INSERT INTO purchases (order_id, account_id, product_id, price_paid, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![order_id, account_id, product_id, price, created_at],
        )?;

        Ok(PurchaseRecord {
            record_id: conn.last_insert_rowid(),
            order_id,
            account_id,
            product_id,
            price_paid: price,
            created_at,
        })
    }
}

/// Opaque order id: `ord_` plus ten random alphanumerics. Uniqueness is the
/// contract (backed by the UNIQUE column), not the charset.
fn new_order_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(10)
        .map(char::from)
        .collect();
    format!("ord_{suffix}")
}

fn map_account(row: &rusqlite::Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        account_id: row.get(0)?,
        external_id: row.get(1)?,
        password_hash: row.get(2)?,
        permission_mask: row.get::<_, i64>(3)? as u8,
        enabled: row.get::<_, i64>(4)? != 0,
        balance: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn map_product(row: &rusqlite::Row<'_>) -> rusqlite::Result<Product> {
    Ok(Product {
        product_id: row.get(0)?,
        name: row.get(1)?,
        price: row.get(2)?,
        quantity: row.get(3)?,
        enabled: row.get::<_, i64>(4)? != 0,
    })
}

fn map_purchase(row: &rusqlite::Row<'_>) -> rusqlite::Result<PurchaseRecord> {
    Ok(PurchaseRecord {
        record_id: row.get(0)?,
        order_id: row.get(1)?,
        account_id: row.get(2)?,
        product_id: row.get(3)?,
        price_paid: row.get(4)?,
        created_at: row.get(5)?,
    })
}
