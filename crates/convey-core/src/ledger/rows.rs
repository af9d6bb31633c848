//! Plain data records for the ledger tables.
//!
//! Records carry no behavior; all reads and mutations go through
//! [`super::store::LedgerStore`].

/// A member account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// Immutable storage identity.
    pub account_id: i64,
    /// Member-facing identifier, unique across accounts.
    pub external_id: i64,
    /// Lowercase hex SHA-256 digest of the password.
    pub password_hash: String,
    /// 4-bit capability mask, `0..=15`.
    pub permission_mask: u8,
    pub enabled: bool,
    /// Points balance, never negative.
    pub balance: i64,
    pub created_at: String,
}

impl Account {
    /// A view safe to hand outward: the stored digest is blanked.
    pub fn redacted(mut self) -> Self {
        self.password_hash.clear();
        self
    }
}

/// A store item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub product_id: i64,
    pub name: String,
    /// Price in points, never negative.
    pub price: i64,
    /// Remaining inventory, never negative.
    pub quantity: i64,
    pub enabled: bool,
}

/// One successful purchase. Append-only; created exactly once per committed
/// purchase transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseRecord {
    pub record_id: i64,
    /// Opaque order identifier, unique per purchase.
    pub order_id: String,
    pub account_id: i64,
    pub product_id: i64,
    /// Price at the moment of purchase.
    pub price_paid: i64,
    pub created_at: String,
}
