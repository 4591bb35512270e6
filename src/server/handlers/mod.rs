pub mod api;
pub mod healthz;
pub mod verify;

use actix_web::{HttpMessage, HttpRequest};

use crate::identity::Principal;

use super::response::Response;

pub trait Handler {
    fn handle(&self, path: &str, req: HttpRequest) -> Response;
}

/// The principal the boundary middleware attached to this request.
///
/// Handlers behind the middleware always have one. Its absence means the
/// handler was routed around the middleware, which is answered with a denial.
fn principal_of(req: &HttpRequest) -> Option<Principal> {
    req.extensions().get::<Principal>().cloned()
}
