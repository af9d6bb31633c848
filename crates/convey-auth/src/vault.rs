//! One-way password digests.
//!
//! Digests are unsalted lowercase-hex SHA-256. The lack of a per-account
//! salt is inherited from the deployed schema, where every stored row already
//! carries this digest form; changing it would invalidate existing rows.

use sha2::{Digest, Sha256};

/// Digest of the well-known default password `"123456"`.
///
/// Newly provisioned accounts carry this digest until the member changes
/// their password.
pub const DEFAULT_PASSWORD_DIGEST: &str =
    "8d969eef6ecad3c29a3a629280e686cf0c3f5d5a86aff3ca12020c923adc6c92";

/// Stateless password digesting. No failure modes; the empty string is a
/// valid (if unwise) password.
#[derive(Debug, Clone, Copy, Default)]
pub struct PasswordVault;

impl PasswordVault {
    pub fn new() -> Self {
        Self
    }

    /// Digest a plaintext password. Deterministic: the same input always
    /// yields the identical digest.
    pub fn hash(&self, plaintext: &str) -> String {
        hex::encode(Sha256::digest(plaintext.as_bytes()))
    }

    /// True iff `plaintext` digests to `stored_digest`. The comparison is in
    /// digest form; a stored digest never meets a plaintext.
    pub fn matches(&self, plaintext: &str, stored_digest: &str) -> bool {
        self.hash(plaintext) == stored_digest
    }
}
