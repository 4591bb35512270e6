use std::fs;
use std::time::Duration;

use anyhow::{Context, Result};
use log::info;

use super::cache::CachedIdentityProvider;
use super::config::{IdpConfig, IdpKind};
use super::jwks::JwksIdentityProvider;
use super::pem::PemIdentityProvider;
use super::union::UnionIdentityProvider;

/// The identity provider the server runs with.
pub type ServerIdentityProvider = CachedIdentityProvider<UnionIdentityProvider>;

pub struct IdpFactory;

impl IdpFactory {
    pub fn new() -> Self {
        Self
    }

    pub fn build_identity_provider(&self, cfg: &IdpConfig) -> Result<ServerIdentityProvider> {
        let rules = cfg.token_rules();
        let idp = match cfg.kind {
            IdpKind::Jwks => {
                info!("Verify tokens with signing keys from {}", cfg.jwks_url);
                let idp = JwksIdentityProvider::new(
                    cfg.jwks_url.clone(),
                    Duration::from_secs(cfg.timeout_secs),
                    Duration::from_secs(cfg.jwks_refresh_secs),
                    rules,
                )?;
                UnionIdentityProvider::Jwks(idp)
            }
            IdpKind::Pem => {
                info!("Verify tokens with public key {}", cfg.public_key_path);
                let public_key = fs::read(&cfg.public_key_path).with_context(|| {
                    format!("read idp public key '{}'", cfg.public_key_path)
                })?;
                UnionIdentityProvider::Pem(PemIdentityProvider::new(&public_key, rules)?)
            }
        };

        let cached = CachedIdentityProvider::new(
            idp,
            Duration::from_secs(cfg.cache_ttl_secs),
            cfg.cache_capacity,
        );
        if cached.is_enabled() {
            info!(
                "Claims cache enabled, ttl {}s, capacity {}",
                cfg.cache_ttl_secs, cfg.cache_capacity
            );
        }
        Ok(cached)
    }
}
