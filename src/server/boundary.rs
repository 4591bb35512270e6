use actix_web::http::header::HeaderMap;
use uuid::Uuid;

use crate::audit::AuditSink;
use crate::decision::{AccessRequest, DecisionEngine, Verdict};
use crate::idp::IdentityProvider;
use crate::rebac::AuthorizationClient;

use super::credential::extract_credential;
use super::target::TargetResolver;

/// The one composition point the middleware reads: credential extraction,
/// target resolution and the decision engine behind a single value.
///
/// It is registered once as app data. Tests replace the whole boundary, never
/// a single stage of it.
pub struct AuthBoundary<I, A, S>
where
    I: IdentityProvider,
    A: AuthorizationClient,
    S: AuditSink,
{
    engine: DecisionEngine<I, A, S>,
    resolver: TargetResolver,
}

impl<I, A, S> AuthBoundary<I, A, S>
where
    I: IdentityProvider,
    A: AuthorizationClient,
    S: AuditSink,
{
    pub fn new(engine: DecisionEngine<I, A, S>, resolver: TargetResolver) -> Self {
        Self { engine, resolver }
    }

    pub fn engine(&self) -> &DecisionEngine<I, A, S> {
        &self.engine
    }

    /// Decides a request given its headers and the method and path it wants
    /// to reach.
    pub async fn authorize(&self, headers: &HeaderMap, method: &str, path: &str) -> Verdict {
        let target = self.resolver.resolve(method, path);
        let req = AccessRequest {
            request_id: Uuid::new_v4().to_string(),
            credential: extract_credential(headers),
            relation: target.relation,
            object: target.object,
        };
        self.engine.evaluate(&req).await
    }
}
