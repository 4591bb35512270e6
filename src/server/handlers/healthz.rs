use actix_web::HttpRequest;
use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::server::response::Response;

use super::Handler;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthzResponse {
    pub version: String,
    pub now: u64,
    pub time_zone: String,
}

pub struct HealthzHandler;

impl HealthzHandler {
    pub fn new() -> Self {
        Self
    }
}

impl Handler for HealthzHandler {
    fn handle(&self, _path: &str, _req: HttpRequest) -> Response {
        let local = Local::now();
        let offset = format!("{}", local.offset());
        let now = local.timestamp() as u64;
        let response = HealthzResponse {
            version: env!("CARGO_PKG_VERSION").to_string(),
            now,
            time_zone: offset,
        };
        Response::json(response)
    }
}
