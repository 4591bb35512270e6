use std::sync::RwLock;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{decode, decode_header, DecodingKey};
use log::{debug, info, warn};
use serde_json::{Map, Value};

use super::{Claims, IdentityError, IdentityProvider, TokenRules};

/// Identity provider that verifies tokens against the signing keys an OIDC
/// provider publishes at its JWKS endpoint.
///
/// The key set is cached and refreshed when it grows older than the refresh
/// interval, or when a token references a key id that is not in the cache.
/// Refreshes are attempted at most once per minimum refresh interval,
/// successful or not. Until the next attempt is due a stale key set keeps being
/// served, and unknown key ids are rejected without contacting the provider.
pub struct JwksIdentityProvider {
    client: reqwest::Client,
    jwks_url: String,
    refresh_interval: Duration,
    min_refresh_interval: Duration,
    rules: TokenRules,

    keys: RwLock<Option<KeyCache>>,
}

struct KeyCache {
    set: JwkSet,
    fetched_at: Instant,
    last_attempt: Instant,
}

struct Lookup {
    key: Option<DecodingKey>,
    stale: bool,
    may_refresh: bool,
}

impl JwksIdentityProvider {
    const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(10);

    pub fn new(
        jwks_url: String,
        timeout: Duration,
        refresh_interval: Duration,
        rules: TokenRules,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .context("build jwks http client")?;
        Ok(Self {
            client,
            jwks_url,
            refresh_interval,
            min_refresh_interval: Self::MIN_REFRESH_INTERVAL,
            rules,
            keys: RwLock::new(None),
        })
    }

    #[cfg(test)]
    fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    async fn decoding_key(&self, kid: Option<&str>) -> Result<DecodingKey, IdentityError> {
        let lookup = self.lookup(kid)?;
        if let Some(ref key) = lookup.key {
            if !lookup.stale || !lookup.may_refresh {
                return Ok(key.clone());
            }
        } else if !lookup.may_refresh {
            return Err(IdentityError::CredentialInvalid(format!(
                "unknown signing key id {kid:?}"
            )));
        }

        match self.fetch_keys().await {
            Ok(set) => {
                let key = Self::find_key(&set, kid)?;
                self.store(set);
                match key {
                    Some(key) => Ok(key),
                    None => Err(IdentityError::CredentialInvalid(format!(
                        "unknown signing key id {kid:?}"
                    ))),
                }
            }
            Err(err) => {
                self.mark_attempt();
                match lookup.key {
                    Some(key) => {
                        warn!("Refresh jwks failed, continue with cached keys: {err}");
                        Ok(key)
                    }
                    None => Err(err),
                }
            }
        }
    }

    fn lookup(&self, kid: Option<&str>) -> Result<Lookup, IdentityError> {
        let guard = match self.keys.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let cache = match guard.as_ref() {
            Some(cache) => cache,
            None => {
                return Ok(Lookup {
                    key: None,
                    stale: true,
                    may_refresh: true,
                })
            }
        };

        Ok(Lookup {
            key: Self::find_key(&cache.set, kid)?,
            stale: cache.fetched_at.elapsed() >= self.refresh_interval,
            may_refresh: cache.last_attempt.elapsed() >= self.min_refresh_interval,
        })
    }

    fn store(&self, set: JwkSet) {
        let mut guard = match self.keys.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let now = Instant::now();
        *guard = Some(KeyCache {
            set,
            fetched_at: now,
            last_attempt: now,
        });
    }

    /// Records a failed refresh so the next one waits for the minimum interval.
    fn mark_attempt(&self) {
        let mut guard = match self.keys.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(cache) = guard.as_mut() {
            cache.last_attempt = Instant::now();
        }
    }

    fn find_key(set: &JwkSet, kid: Option<&str>) -> Result<Option<DecodingKey>, IdentityError> {
        let jwk = match kid {
            Some(kid) => set.find(kid),
            // Tokens without a key id are only accepted when there is no ambiguity
            None if set.keys.len() == 1 => set.keys.first(),
            None => None,
        };
        let jwk = match jwk {
            Some(jwk) => jwk,
            None => return Ok(None),
        };

        match DecodingKey::from_jwk(jwk) {
            Ok(key) => Ok(Some(key)),
            Err(e) => Err(IdentityError::CredentialInvalid(format!(
                "signing key {kid:?} is unusable: {e}"
            ))),
        }
    }

    async fn fetch_keys(&self) -> Result<JwkSet, IdentityError> {
        debug!("Fetch jwks from {}", self.jwks_url);
        let resp = match self.client.get(&self.jwks_url).send().await {
            Ok(resp) => resp,
            Err(e) => return Err(IdentityError::Unavailable(format!("fetch jwks: {e}"))),
        };

        let status = resp.status();
        if !status.is_success() {
            return Err(IdentityError::Unavailable(format!(
                "fetch jwks: unexpected status {status}"
            )));
        }

        let set: JwkSet = match resp.json().await {
            Ok(set) => set,
            Err(e) => return Err(IdentityError::Unavailable(format!("decode jwks: {e}"))),
        };
        info!("Loaded {} signing keys from jwks endpoint", set.keys.len());
        Ok(set)
    }
}

#[async_trait]
impl IdentityProvider for JwksIdentityProvider {
    async fn authenticate(&self, bearer_token: &str) -> Result<Claims, IdentityError> {
        let header = decode_header(bearer_token)
            .map_err(|e| IdentityError::CredentialInvalid(format!("decode jwt header: {e}")))?;
        let validation = self.rules.validation(header.alg)?;
        let key = self.decoding_key(header.kid.as_deref()).await?;

        let raw = match decode::<Map<String, Value>>(bearer_token, &key, &validation) {
            Ok(data) => data.claims,
            Err(e) => {
                return Err(IdentityError::CredentialInvalid(format!(
                    "validate jwt token failed: {e}"
                )))
            }
        };

        self.rules.into_claims(raw)
    }
}
