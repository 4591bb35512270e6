use actix_web::HttpRequest;
use log::error;
use serde::{Deserialize, Serialize};

use crate::server::response::Response;

use super::{principal_of, Handler};

#[derive(Debug, Serialize, Deserialize)]
pub struct WhoamiResponse {
    /// Canonical `user:<id>` form.
    pub name: String,
    pub raw_identifier: String,
    pub subject: String,
    pub expires_at: u64,
}

/// Serves `/api/...` after the boundary allowed the request.
pub struct ApiHandler;

impl ApiHandler {
    pub fn new() -> Self {
        Self
    }

    fn handle_whoami(&self, req: &HttpRequest) -> Response {
        let principal = match principal_of(req) {
            Some(principal) => principal,
            None => {
                error!("No principal attached to whoami request, deny");
                return Response::access_denied();
            }
        };
        Response::json(WhoamiResponse {
            name: principal.canonical_id,
            raw_identifier: principal.raw_identifier,
            subject: principal.claims.subject,
            expires_at: principal.claims.expires_at,
        })
    }
}

impl Handler for ApiHandler {
    fn handle(&self, path: &str, req: HttpRequest) -> Response {
        let path = path.trim_matches('/');
        if path == "whoami" && req.method().as_str() == "GET" {
            return self.handle_whoami(&req);
        }
        Response::not_found()
    }
}
