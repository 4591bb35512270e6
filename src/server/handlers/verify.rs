use actix_web::http::header::{HeaderName, HeaderValue};
use actix_web::HttpRequest;
use log::error;

use crate::server::response::Response;

use super::{principal_of, Handler};

pub const AUTH_PRINCIPAL_HEADER: &str = "x-auth-principal";

/// Answers forward-auth subrequests from a reverse proxy. Reaching this
/// handler means the boundary allowed the forwarded request.
pub struct VerifyHandler;

impl VerifyHandler {
    pub fn new() -> Self {
        Self
    }
}

impl Handler for VerifyHandler {
    fn handle(&self, _path: &str, req: HttpRequest) -> Response {
        let principal = match principal_of(&req) {
            Some(principal) => principal,
            None => {
                error!("No principal attached to verify request, deny");
                return Response::access_denied();
            }
        };

        let value = match HeaderValue::from_bytes(principal.canonical_id.as_bytes()) {
            Ok(value) => value,
            Err(e) => {
                error!(
                    "Principal '{}' is not a valid header value: {e}",
                    principal.canonical_id
                );
                return Response::access_denied();
            }
        };
        Response::ok().with_header(HeaderName::from_static(AUTH_PRINCIPAL_HEADER), value)
    }
}
