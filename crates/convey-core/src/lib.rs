//! Access-control and points-ledger core for the Convey membership backend.
//!
//! The HTTP layer above this crate does routing and parameter parsing only;
//! every privileged decision and every balance/inventory mutation goes
//! through here:
//!
//! - [`ledger::LedgerStore`]: the SQLite-backed account/product/purchase
//!   store, including the atomic purchase transaction.
//! - [`gate::AccessGate`]: per-request authorization (token + capability
//!   mask) and login.
//! - [`config::CoreConfig`]: process configuration (signing secret, token
//!   lifetime, database location, superuser bootstrap).
//!
//! Dependencies are injected at construction; there are no hidden globals.

pub mod config;
pub mod gate;
pub mod ledger;

pub use config::CoreConfig;
pub use gate::{AccessGate, Decision, GateConfig, GateError, LoginSession};
pub use ledger::{
    Account, LedgerStore, Product, PurchaseError, PurchaseRecord, StoreError,
};

use convey_auth::{SessionTokenService, TokenConfig};

/// Wire the core up from configuration: open the store, bootstrap the
/// superuser account and build the gate.
pub fn bootstrap(config: &CoreConfig) -> anyhow::Result<(LedgerStore, AccessGate)> {
    let store = match &config.database.path {
        Some(path) => LedgerStore::open(path)?,
        None => LedgerStore::memory()?,
    };
    store.ensure_superuser(config.superuser.external_id, &config.superuser.password)?;

    let tokens = SessionTokenService::new(TokenConfig::new(
        config.token.secret.as_bytes(),
        config.token.ttl_seconds,
    ))?;
    let gate = AccessGate::new(store.clone(), tokens, config.gate.clone());
    tracing::info!("core bootstrapped, superuser ensured");
    Ok((store, gate))
}
