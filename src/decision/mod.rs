mod engine;
mod policy;

pub use engine::{AccessRequest, Credential, DecisionEngine, Verdict};
pub use policy::{Environment, FallbackOutcome, FallbackPolicy};

use std::fmt;

use serde::Serialize;

/// Final answer for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Allow,
    Deny,
    /// Denied because the authorization backend was unreachable and the
    /// fallback policy did not grant access.
    DenyFallbackUnavailable,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// Why a decision was reached. Only ever written to the audit trail, never to
/// the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    CredentialMissing,
    CredentialMalformed,
    CredentialInvalid,
    IdentityProviderUnavailable,
    InvalidIdentifier,
    InvalidTarget,
    BackendAllowed,
    BackendDenied,
    BackendRejected,
    FallbackUnavailable,
    FallbackDisabled,
    FallbackGranted,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::CredentialMissing => "CREDENTIAL_MISSING",
            ReasonCode::CredentialMalformed => "CREDENTIAL_MALFORMED",
            ReasonCode::CredentialInvalid => "CREDENTIAL_INVALID",
            ReasonCode::IdentityProviderUnavailable => "IDENTITY_PROVIDER_UNAVAILABLE",
            ReasonCode::InvalidIdentifier => "INVALID_IDENTIFIER",
            ReasonCode::InvalidTarget => "INVALID_TARGET",
            ReasonCode::BackendAllowed => "BACKEND_ALLOWED",
            ReasonCode::BackendDenied => "BACKEND_DENIED",
            ReasonCode::BackendRejected => "BACKEND_REJECTED",
            ReasonCode::FallbackUnavailable => "FALLBACK_UNAVAILABLE",
            ReasonCode::FallbackDisabled => "FALLBACK_DISABLED",
            ReasonCode::FallbackGranted => "FALLBACK_GRANTED",
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Normal,
    /// Access was granted without consulting the authorization backend.
    Elevated,
}

/// Last state the decision engine reached before terminating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Start,
    IdentityResolved,
    QueryIssued,
    FallbackEvaluated,
}

/// The audit record of one evaluation. Built once by the decision engine at
/// the terminal transition and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthorizationDecision {
    pub request_id: String,
    pub decision: Decision,
    pub reason: ReasonCode,
    pub severity: Severity,
    pub stage: Stage,
    /// Unix timestamp in seconds.
    pub timestamp: u64,

    /// Absent when the backend was never consulted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_reachable: Option<bool>,

    /// Canonical id of the principal, once resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal: Option<String>,

    pub relation: String,
    pub object: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Utc;
    use serde_json::{json, Map};

    use crate::idp::{Claims, IdentityError, IdentityProvider};
    use crate::rebac::{AuthorizationClient, AuthorizationQuery, BackendError};

    use super::*;

    /// Accepts every token as the username it spells, except a few reserved
    /// values that trigger failures.
    pub struct MockIdentityProvider {
        calls: AtomicUsize,
    }

    impl MockIdentityProvider {
        pub const INVALID: &'static str = "expired-token";
        pub const UNAVAILABLE: &'static str = "idp-down";

        pub fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl IdentityProvider for MockIdentityProvider {
        async fn authenticate(&self, bearer_token: &str) -> Result<Claims, IdentityError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match bearer_token {
                Self::INVALID => Err(IdentityError::CredentialInvalid(String::from(
                    "token expired",
                ))),
                Self::UNAVAILABLE => Err(IdentityError::Unavailable(String::from(
                    "connection refused",
                ))),
                username => Ok(Claims {
                    username: username.to_string(),
                    subject: String::from("0d4a6c1e"),
                    expires_at: (Utc::now().timestamp() + 60) as u64,
                    extra: Map::new(),
                }),
            }
        }
    }

    #[derive(Debug, Clone, Copy)]
    pub enum MockBackend {
        Allow,
        Deny,
        Unavailable,
        Rejected,
        Malformed,
    }

    pub struct MockAuthorizationClient {
        backend: MockBackend,
        calls: AtomicUsize,
        queries: Mutex<Vec<AuthorizationQuery>>,
    }

    impl MockAuthorizationClient {
        pub fn new(backend: MockBackend) -> Self {
            Self {
                backend,
                calls: AtomicUsize::new(0),
                queries: Mutex::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn queries(&self) -> Vec<AuthorizationQuery> {
            self.queries.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AuthorizationClient for MockAuthorizationClient {
        async fn check(&self, query: &AuthorizationQuery) -> Result<bool, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.queries.lock().unwrap().push(query.clone());
            match self.backend {
                MockBackend::Allow => Ok(true),
                MockBackend::Deny => Ok(false),
                MockBackend::Unavailable => Err(BackendError::Unavailable(String::from(
                    "connection refused",
                ))),
                MockBackend::Rejected => Err(BackendError::Rejected {
                    status: 400,
                    message: String::from("type 'document' not found"),
                }),
                MockBackend::Malformed => Err(BackendError::Malformed(String::from(
                    "missing field `allowed`",
                ))),
            }
        }
    }

    #[test]
    fn test_decision_serialize() {
        let record = AuthorizationDecision {
            request_id: String::from("9b1f"),
            decision: Decision::DenyFallbackUnavailable,
            reason: ReasonCode::FallbackUnavailable,
            severity: Severity::Normal,
            stage: Stage::FallbackEvaluated,
            timestamp: 1700000000,
            backend_reachable: Some(false),
            principal: Some(String::from("user:alice")),
            relation: String::from("viewer"),
            object: String::from("document:1"),
            detail: None,
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(
            value,
            json!({
                "request_id": "9b1f",
                "decision": "DENY_FALLBACK_UNAVAILABLE",
                "reason": "FALLBACK_UNAVAILABLE",
                "severity": "normal",
                "stage": "FALLBACK_EVALUATED",
                "timestamp": 1700000000u64,
                "backend_reachable": false,
                "principal": "user:alice",
                "relation": "viewer",
                "object": "document:1",
            })
        );
    }

    #[test]
    fn test_reason_code_str() {
        for reason in [
            ReasonCode::CredentialMissing,
            ReasonCode::IdentityProviderUnavailable,
            ReasonCode::FallbackGranted,
        ] {
            let value = serde_json::to_value(reason).unwrap();
            assert_eq!(value, reason.as_str());
        }
        assert_eq!(ReasonCode::BackendDenied.to_string(), "BACKEND_DENIED");
    }
}
