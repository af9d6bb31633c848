//! The points ledger: accounts, products and the purchase log.
//!
//! [`store::LedgerStore`] owns all mutation paths; [`rows`] holds the plain
//! data records; [`schema`] holds the DDL.

pub mod rows;
pub mod schema;
pub mod store;

pub use rows::{Account, Product, PurchaseRecord};
pub use store::{LedgerStore, PurchaseError, StoreError};

pub(crate) fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}
