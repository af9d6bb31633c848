//! Per-request authorization and login.
//!
//! The gate is the one place a privileged route decision happens: it
//! composes the session token service and the capability mask model against
//! the account store. It performs at most one account read per decision and
//! never writes; a permission view that goes stale against a concurrent
//! mutation is accepted.

use crate::ledger::{Account, LedgerStore, StoreError};
use chrono::{DateTime, Utc};
use convey_auth::{grants_all, Capability, PasswordVault, SessionTokenService, TokenError};
use serde::Deserialize;
use std::collections::HashSet;
use thiserror::Error;

/// Gate configuration: the set of routes reachable without authentication.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GateConfig {
    #[serde(default)]
    pub exempt_routes: HashSet<String>,
}

/// Why a request was allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The route is public; no checks were run.
    Exempt,
    /// Operator authenticated and (if required) holds every capability.
    Allowed,
}

/// Denial reasons. All recoverable and caller-visible; the gate never
/// panics a request away.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("no operator id supplied")]
    MissingOperator,

    #[error("no bearer token supplied")]
    MissingToken,

    #[error("token invalid or not issued for operator {operator}")]
    InvalidToken { operator: i64 },

    #[error("account not found: {account_id}")]
    AccountNotFound { account_id: i64 },

    #[error("account {account_id} is disabled")]
    AccountDisabled { account_id: i64 },

    #[error("wrong member id or password")]
    BadCredentials,

    #[error("operator {operator} lacks a required capability")]
    PermissionDenied { operator: i64 },

    #[error("token issuance failed: {0}")]
    Token(#[from] TokenError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// A successful login: the account view (digest blanked) and a fresh token.
#[derive(Debug, Clone)]
pub struct LoginSession {
    pub account: Account,
    pub token: String,
}

/// Request-time access decisions over injected dependencies.
pub struct AccessGate {
    store: LedgerStore,
    tokens: SessionTokenService,
    vault: PasswordVault,
    config: GateConfig,
}

impl AccessGate {
    pub fn new(store: LedgerStore, tokens: SessionTokenService, config: GateConfig) -> Self {
        Self {
            store,
            tokens,
            vault: PasswordVault::new(),
            config,
        }
    }

    /// Decide a request. Checks short-circuit in order: exempt route,
    /// operator present, token present, token valid, capabilities granted.
    pub fn authorize(
        &self,
        route: &str,
        operator: Option<i64>,
        token: Option<&str>,
        required: &[Capability],
    ) -> Result<Decision, GateError> {
        self.authorize_at(Utc::now(), route, operator, token, required)
    }

    /// Like [`authorize`](Self::authorize) but with an explicit `now`. Use
    /// this in tests to avoid flaky clock-dependent assertions.
    pub fn authorize_at(
        &self,
        now: DateTime<Utc>,
        route: &str,
        operator: Option<i64>,
        token: Option<&str>,
        required: &[Capability],
    ) -> Result<Decision, GateError> {
        if self.config.exempt_routes.contains(route) {
            return Ok(Decision::Exempt);
        }

        let operator = operator.ok_or(GateError::MissingOperator)?;
        let token = token.ok_or(GateError::MissingToken)?;

        if !self.tokens.verify_at(now, token, operator) {
            tracing::warn!(operator, route, "rejected invalid token");
            return Err(GateError::InvalidToken { operator });
        }

        if required.is_empty() {
            return Ok(Decision::Allowed);
        }

        let account = self
            .store
            .get_account_by_id(operator)?
            .ok_or(GateError::AccountNotFound {
                account_id: operator,
            })?;

        if !grants_all(required, account.permission_mask) {
            tracing::debug!(
                operator,
                route,
                mask = account.permission_mask,
                "capability check failed"
            );
            return Err(GateError::PermissionDenied { operator });
        }

        Ok(Decision::Allowed)
    }

    /// Authenticate a member by external id and password and issue a token.
    ///
    /// Unknown member and wrong password collapse into one
    /// [`GateError::BadCredentials`] so the response does not leak which
    /// half failed; disabled accounts are reported distinctly.
    pub fn login(&self, external_id: i64, password: &str) -> Result<LoginSession, GateError> {
        self.login_at(Utc::now(), external_id, password)
    }

    /// Like [`login`](Self::login) but with an explicit `now`.
    pub fn login_at(
        &self,
        now: DateTime<Utc>,
        external_id: i64,
        password: &str,
    ) -> Result<LoginSession, GateError> {
        let Some(account) = self.store.get_account_by_external_id(external_id)? else {
            return Err(GateError::BadCredentials);
        };

        if !self.vault.matches(password, &account.password_hash) {
            tracing::debug!(external_id, "login rejected, wrong password");
            return Err(GateError::BadCredentials);
        }

        if !account.enabled {
            tracing::warn!(external_id, account_id = account.account_id, "login rejected, account disabled");
            return Err(GateError::AccountDisabled {
                account_id: account.account_id,
            });
        }

        let token = self.tokens.issue_at(now, account.account_id)?;
        tracing::debug!(external_id, account_id = account.account_id, "login succeeded");
        Ok(LoginSession {
            account: account.redacted(),
            token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use convey_auth::TokenConfig;

    fn fixed_now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn test_gate() -> (LedgerStore, AccessGate) {
        let store = LedgerStore::memory().unwrap();
        let tokens = SessionTokenService::new(TokenConfig::new("gate-test-secret", 3600)).unwrap();
        let config = GateConfig {
            exempt_routes: HashSet::from(["status".to_string()]),
        };
        let gate = AccessGate::new(store.clone(), tokens, config);
        (store, gate)
    }

    fn token_for(id: i64) -> String {
        SessionTokenService::new(TokenConfig::new("gate-test-secret", 3600))
            .unwrap()
            .issue_at(fixed_now(), id)
            .unwrap()
    }

    #[test]
    fn exempt_route_allows_without_any_checks() {
        let (_store, gate) = test_gate();
        let decision = gate
            .authorize_at(fixed_now(), "status", None, None, &[Capability::Super])
            .unwrap();
        assert_eq!(decision, Decision::Exempt);
    }

    #[test]
    fn missing_operator_is_checked_before_missing_token() {
        let (_store, gate) = test_gate();
        let err = gate
            .authorize_at(fixed_now(), "user", None, None, &[])
            .unwrap_err();
        assert!(matches!(err, GateError::MissingOperator));
    }

    #[test]
    fn missing_token_is_denied() {
        let (_store, gate) = test_gate();
        let err = gate
            .authorize_at(fixed_now(), "user", Some(1), None, &[])
            .unwrap_err();
        assert!(matches!(err, GateError::MissingToken));
    }

    #[test]
    fn token_for_other_operator_is_denied() {
        let (_store, gate) = test_gate();
        let token = token_for(5);
        let err = gate
            .authorize_at(fixed_now(), "user", Some(6), Some(&token), &[])
            .unwrap_err();
        assert!(matches!(err, GateError::InvalidToken { operator: 6 }));
    }

    #[test]
    fn empty_required_set_allows_any_authenticated_operator() {
        let (_store, gate) = test_gate();
        let token = token_for(5);
        let decision = gate
            .authorize_at(fixed_now(), "file/upload", Some(5), Some(&token), &[])
            .unwrap();
        // No account row needed: the empty set means "any authenticated".
        assert_eq!(decision, Decision::Allowed);
    }

    #[test]
    fn capability_check_loads_account_and_applies_mask() {
        let (store, gate) = test_gate();
        let account = store.create_account(9001).unwrap();
        store.set_permission_mask(account.account_id, 2).unwrap();
        let token = token_for(account.account_id);

        let decision = gate
            .authorize_at(
                fixed_now(),
                "user",
                Some(account.account_id),
                Some(&token),
                &[Capability::User],
            )
            .unwrap();
        assert_eq!(decision, Decision::Allowed);

        store.set_permission_mask(account.account_id, 4).unwrap();
        let err = gate
            .authorize_at(
                fixed_now(),
                "user",
                Some(account.account_id),
                Some(&token),
                &[Capability::User],
            )
            .unwrap_err();
        assert!(matches!(err, GateError::PermissionDenied { .. }));
    }

    #[test]
    fn unknown_operator_with_valid_token_is_account_not_found() {
        let (_store, gate) = test_gate();
        let token = token_for(42);
        let err = gate
            .authorize_at(
                fixed_now(),
                "user",
                Some(42),
                Some(&token),
                &[Capability::User],
            )
            .unwrap_err();
        assert!(matches!(err, GateError::AccountNotFound { account_id: 42 }));
    }

    #[test]
    fn super_mask_passes_multi_capability_requirements() {
        let (store, gate) = test_gate();
        let account = store.create_account(9001).unwrap();
        store.set_permission_mask(account.account_id, 15).unwrap();
        let token = token_for(account.account_id);
        let decision = gate
            .authorize_at(
                fixed_now(),
                "score",
                Some(account.account_id),
                Some(&token),
                &[Capability::User, Capability::Score, Capability::Super],
            )
            .unwrap();
        assert_eq!(decision, Decision::Allowed);
    }

    #[test]
    fn login_unknown_member_and_wrong_password_are_indistinguishable() {
        let (store, gate) = test_gate();
        store.create_account(9001).unwrap();

        let unknown = gate.login_at(fixed_now(), 9999, "123456").unwrap_err();
        let wrong = gate.login_at(fixed_now(), 9001, "not-it").unwrap_err();
        assert!(matches!(unknown, GateError::BadCredentials));
        assert!(matches!(wrong, GateError::BadCredentials));
    }

    #[test]
    fn login_disabled_account_is_distinct() {
        let (store, gate) = test_gate();
        let account = store.create_account(9001).unwrap();
        store.set_enabled(account.account_id, false).unwrap();
        let err = gate.login_at(fixed_now(), 9001, "123456").unwrap_err();
        assert!(matches!(err, GateError::AccountDisabled { .. }));
    }

    #[test]
    fn login_issues_verifiable_token_and_redacts_digest() {
        let (store, gate) = test_gate();
        let account = store.create_account(9001).unwrap();

        let session = gate.login_at(fixed_now(), 9001, "123456").unwrap();
        assert_eq!(session.account.account_id, account.account_id);
        assert!(session.account.password_hash.is_empty());

        let decision = gate
            .authorize_at(
                fixed_now(),
                "user/updatepassword",
                Some(account.account_id),
                Some(&session.token),
                &[],
            )
            .unwrap();
        assert_eq!(decision, Decision::Allowed);
    }
}
