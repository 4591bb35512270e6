use actix_web::body::{EitherBody, MessageBody};
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::middleware::Next;
use actix_web::web::Data;
use actix_web::{Error, HttpMessage, HttpResponse};
use log::{debug, error};

use crate::audit::AuditSink;
use crate::idp::IdentityProvider;
use crate::rebac::AuthorizationClient;

use super::boundary::AuthBoundary;
use super::response::Response;

pub const FORWARDED_METHOD: &str = "x-forwarded-method";
pub const FORWARDED_URI: &str = "x-forwarded-uri";

/// Authorizes the request against its own method and path.
///
/// On allow the resolved [`crate::identity::Principal`] is stored in the
/// request extensions for downstream handlers. On deny the uniform 403 is
/// returned and the wrapped service is never called.
pub async fn authenticate<I, A, S, B>(
    req: ServiceRequest,
    next: Next<B>,
) -> Result<ServiceResponse<EitherBody<B>>, Error>
where
    I: IdentityProvider + 'static,
    A: AuthorizationClient + 'static,
    S: AuditSink + 'static,
    B: MessageBody + 'static,
{
    let method = req.method().as_str().to_string();
    let path = match req.uri().path_and_query() {
        Some(pq) => pq.as_str().to_string(),
        None => req.path().to_string(),
    };
    guard::<I, A, S, B>(req, next, method, path).await
}

/// Authorizes the request a reverse proxy is asking about, taken from the
/// `X-Forwarded-Method` and `X-Forwarded-Uri` headers.
///
/// Without `X-Forwarded-Method` the method of the verify request itself is
/// used. Without `X-Forwarded-Uri` the target is the default object.
pub async fn authenticate_forwarded<I, A, S, B>(
    req: ServiceRequest,
    next: Next<B>,
) -> Result<ServiceResponse<EitherBody<B>>, Error>
where
    I: IdentityProvider + 'static,
    A: AuthorizationClient + 'static,
    S: AuditSink + 'static,
    B: MessageBody + 'static,
{
    let method = match req.headers().get(FORWARDED_METHOD) {
        // Unreadable values become an unknown method, which is denied
        Some(value) => value.to_str().unwrap_or_default().to_string(),
        None => req.method().as_str().to_string(),
    };
    let path = match req.headers().get(FORWARDED_URI) {
        Some(value) => value.to_str().unwrap_or_default().to_string(),
        None => String::from("/"),
    };
    guard::<I, A, S, B>(req, next, method, path).await
}

async fn guard<I, A, S, B>(
    req: ServiceRequest,
    next: Next<B>,
    method: String,
    path: String,
) -> Result<ServiceResponse<EitherBody<B>>, Error>
where
    I: IdentityProvider + 'static,
    A: AuthorizationClient + 'static,
    S: AuditSink + 'static,
    B: MessageBody + 'static,
{
    let boundary = match req.app_data::<Data<AuthBoundary<I, A, S>>>() {
        Some(boundary) => boundary.clone(),
        None => {
            error!("Authorization boundary is not registered, deny {method} {path}");
            return Ok(deny(req));
        }
    };

    let verdict = boundary.authorize(req.headers(), &method, &path).await;
    let request_id = verdict.decision.request_id.clone();
    let principal = match verdict.into_allowed_principal() {
        Some(principal) => principal,
        None => return Ok(deny(req)),
    };

    debug!(
        "Request {request_id}: {} allowed to {method} {path}",
        principal.canonical_id
    );
    req.extensions_mut().insert(principal);

    let res = next.call(req).await?;
    Ok(res.map_into_left_body())
}

fn deny<B>(req: ServiceRequest) -> ServiceResponse<EitherBody<B>> {
    let resp: HttpResponse = Response::access_denied().into();
    req.into_response(resp).map_into_right_body()
}
