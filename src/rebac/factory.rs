use std::time::Duration;

use anyhow::Result;
use log::{info, warn};

use super::config::RebacConfig;
use super::openfga::OpenFgaClient;

pub struct RebacFactory;

impl RebacFactory {
    pub fn new() -> Self {
        Self
    }

    pub fn build_authorization_client(&self, cfg: &RebacConfig) -> Result<OpenFgaClient> {
        info!(
            "Check permissions against store {} at {}",
            cfg.store_id, cfg.url
        );
        if cfg.api_token.is_empty() {
            warn!(
                "No api_token for the authorization backend, checks are sent without \
                 credentials"
            );
        }

        OpenFgaClient::new(
            &cfg.url,
            &cfg.store_id,
            cfg.authorization_model_id(),
            cfg.api_token(),
            Duration::from_secs(cfg.timeout_secs),
            Duration::from_secs(cfg.connect_timeout_secs),
        )
    }
}
