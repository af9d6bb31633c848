//! Storage-free authentication primitives for the Convey membership backend.
//!
//! Three pieces, all pure over immutable state and safe for unbounded
//! concurrent callers:
//!
//! - [`vault`]: one-way password digests.
//! - [`token`]: HMAC-signed session tokens bound to an account id.
//! - [`permission`]: the 4-bit capability mask model with the super escape.
//!
//! Nothing in this crate touches the account store; the decision logic that
//! composes these against persisted accounts lives in `convey-core`.

pub mod permission;
pub mod token;
pub mod vault;

pub use permission::{grants, grants_all, grants_named, is_valid_mask, Capability, SUPER_MASK};
pub use token::{SessionTokenService, TokenConfig, TokenError};
pub use vault::{PasswordVault, DEFAULT_PASSWORD_DIGEST};
