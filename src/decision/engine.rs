use chrono::Utc;
use log::{debug, error, info, warn};

use crate::audit::AuditSink;
use crate::identity::Principal;
use crate::idp::{IdentityError, IdentityProvider};
use crate::rebac::{AuthorizationClient, AuthorizationQuery, BackendError, QueryError};

use super::policy::{FallbackOutcome, FallbackPolicy};
use super::{AuthorizationDecision, Decision, ReasonCode, Severity, Stage};

/// The credential found on an inbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    Missing,
    /// An `Authorization` header that is not a usable bearer token.
    Malformed,
    Bearer(String),
}

/// Everything the engine needs to decide one request.
#[derive(Debug, Clone)]
pub struct AccessRequest {
    pub request_id: String,
    pub credential: Credential,
    pub relation: String,
    pub object: String,
}

/// Result of one evaluation: the recorded decision, plus the principal when
/// identity resolution got that far.
#[derive(Debug)]
pub struct Verdict {
    pub decision: AuthorizationDecision,
    principal: Option<Principal>,
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        self.decision.decision.is_allowed()
    }

    /// The principal to hand downstream. Always `None` for denials.
    pub fn into_allowed_principal(self) -> Option<Principal> {
        if self.is_allowed() {
            self.principal
        } else {
            None
        }
    }
}

/// Progress of a single evaluation.
struct Trail {
    stage: Stage,
    principal: Option<Principal>,
    backend_reachable: Option<bool>,
}

struct Outcome {
    decision: Decision,
    reason: ReasonCode,
    detail: Option<String>,
}

impl Outcome {
    fn allow(reason: ReasonCode) -> Self {
        Self {
            decision: Decision::Allow,
            reason,
            detail: None,
        }
    }

    fn deny(reason: ReasonCode, detail: Option<String>) -> Self {
        Self {
            decision: Decision::Deny,
            reason,
            detail,
        }
    }
}

/// Resolves the caller, asks the authorization backend, and applies the
/// fallback policy when the backend cannot answer.
///
/// Every call to [`DecisionEngine::evaluate`] ends in exactly one
/// [`AuthorizationDecision`] which is appended to the audit sink. The
/// collaborators are built once at startup and shared by all requests.
pub struct DecisionEngine<I, A, S>
where
    I: IdentityProvider,
    A: AuthorizationClient,
    S: AuditSink,
{
    idp: I,
    authz: A,
    audit: S,
    policy: FallbackPolicy,
}

impl<I, A, S> DecisionEngine<I, A, S>
where
    I: IdentityProvider,
    A: AuthorizationClient,
    S: AuditSink,
{
    pub fn new(idp: I, authz: A, audit: S, policy: FallbackPolicy) -> Self {
        Self {
            idp,
            authz,
            audit,
            policy,
        }
    }

    pub fn policy(&self) -> &FallbackPolicy {
        &self.policy
    }

    pub fn identity_provider(&self) -> &I {
        &self.idp
    }

    pub fn authorization_client(&self) -> &A {
        &self.authz
    }

    pub fn audit_sink(&self) -> &S {
        &self.audit
    }

    pub async fn evaluate(&self, req: &AccessRequest) -> Verdict {
        let mut trail = Trail {
            stage: Stage::Start,
            principal: None,
            backend_reachable: None,
        };
        let outcome = self.decide(req, &mut trail).await;

        let severity = match outcome.reason {
            ReasonCode::FallbackGranted => Severity::Elevated,
            _ => Severity::Normal,
        };
        let record = AuthorizationDecision {
            request_id: req.request_id.clone(),
            decision: outcome.decision,
            reason: outcome.reason,
            severity,
            stage: trail.stage,
            timestamp: Utc::now().timestamp().max(0) as u64,
            backend_reachable: trail.backend_reachable,
            principal: trail.principal.as_ref().map(|p| p.canonical_id.clone()),
            relation: req.relation.clone(),
            object: req.object.clone(),
            detail: outcome.detail,
        };

        if let Err(e) = self.audit.append(&record) {
            error!(
                "Append audit record for request {} failed: {e:#}",
                record.request_id
            );
        }

        Verdict {
            decision: record,
            principal: trail.principal,
        }
    }

    async fn decide(&self, req: &AccessRequest, trail: &mut Trail) -> Outcome {
        let token = match req.credential {
            Credential::Bearer(ref token) => token,
            Credential::Missing => return Outcome::deny(ReasonCode::CredentialMissing, None),
            Credential::Malformed => return Outcome::deny(ReasonCode::CredentialMalformed, None),
        };

        let claims = match self.idp.authenticate(token).await {
            Ok(claims) => claims,
            Err(IdentityError::CredentialInvalid(msg)) => {
                debug!("Request {}: {msg}", req.request_id);
                return Outcome::deny(ReasonCode::CredentialInvalid, Some(msg));
            }
            Err(IdentityError::Unavailable(msg)) => {
                warn!(
                    "Request {}: identity provider unavailable, deny: {msg}",
                    req.request_id
                );
                return Outcome::deny(ReasonCode::IdentityProviderUnavailable, Some(msg));
            }
        };

        let principal = match Principal::from_claims(claims) {
            Ok(principal) => principal,
            Err(e) => {
                info!("Request {}: {e}", req.request_id);
                return Outcome::deny(ReasonCode::InvalidIdentifier, Some(e.to_string()));
            }
        };
        trail.stage = Stage::IdentityResolved;

        let query = AuthorizationQuery::new(
            principal.canonical_id.as_str(),
            req.relation.as_str(),
            req.object.as_str(),
        );
        trail.principal = Some(principal);
        let query = match query {
            Ok(query) => query,
            Err(e @ QueryError::Subject(..)) => {
                return Outcome::deny(ReasonCode::InvalidIdentifier, Some(e.to_string()))
            }
            Err(e) => {
                debug!("Request {}: {e}", req.request_id);
                return Outcome::deny(ReasonCode::InvalidTarget, Some(e.to_string()));
            }
        };

        trail.stage = Stage::QueryIssued;
        match self.authz.check(&query).await {
            Ok(true) => {
                trail.backend_reachable = Some(true);
                Outcome::allow(ReasonCode::BackendAllowed)
            }
            Ok(false) => {
                trail.backend_reachable = Some(true);
                Outcome::deny(ReasonCode::BackendDenied, None)
            }
            Err(e @ BackendError::Rejected { .. }) | Err(e @ BackendError::Malformed(_)) => {
                trail.backend_reachable = Some(true);
                warn!("Request {}: {e}", req.request_id);
                Outcome::deny(ReasonCode::BackendRejected, Some(e.to_string()))
            }
            Err(BackendError::Unavailable(msg)) => {
                trail.backend_reachable = Some(false);
                trail.stage = Stage::FallbackEvaluated;
                self.fallback(req, &query, msg)
            }
        }
    }

    fn fallback(&self, req: &AccessRequest, query: &AuthorizationQuery, msg: String) -> Outcome {
        match self.policy.on_backend_unavailable() {
            FallbackOutcome::Forbidden => {
                warn!(
                    "Request {}: authorization backend unavailable, \
                     fallback is forbidden in production, deny: {msg}",
                    req.request_id
                );
                Outcome {
                    decision: Decision::DenyFallbackUnavailable,
                    reason: ReasonCode::FallbackUnavailable,
                    detail: Some(msg),
                }
            }
            FallbackOutcome::Disabled => {
                warn!(
                    "Request {}: authorization backend unavailable, \
                     fallback is disabled, deny: {msg}",
                    req.request_id
                );
                Outcome {
                    decision: Decision::DenyFallbackUnavailable,
                    reason: ReasonCode::FallbackDisabled,
                    detail: Some(msg),
                }
            }
            FallbackOutcome::Granted => {
                warn!(
                    "Request {}: authorization backend unavailable, \
                     FALLBACK GRANTED {} {} {}: {msg}",
                    req.request_id,
                    query.subject(),
                    query.relation(),
                    query.object()
                );
                Outcome {
                    decision: Decision::Allow,
                    reason: ReasonCode::FallbackGranted,
                    detail: Some(msg),
                }
            }
        }
    }
}
