use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::config::{expandenv, CommonConfig, PathSet};

use super::TokenRules;

/// Identity provider configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IdpConfig {
    /// Where signing keys come from: `jwks` (fetched from an OIDC provider) or
    /// `pem` (a local RSA public key).
    #[serde(default = "IdpConfig::default_kind")]
    pub kind: IdpKind,

    /// The JWKS endpoint, for example
    /// `https://keycloak.example.com/realms/main/protocol/openid-connect/certs`.
    /// Required when kind is `jwks`.
    #[serde(default = "IdpConfig::default_empty")]
    pub jwks_url: String,

    /// Path to the RSA public key in PEM format.
    /// Default: {config_path}/pki/idp_public.pem. Only used when kind is `pem`.
    #[serde(default = "IdpConfig::default_empty")]
    pub public_key_path: String,

    /// Expected `iss` claim. Empty disables the check.
    #[serde(default = "IdpConfig::default_empty")]
    pub issuer: String,

    /// Expected `aud` claim. Empty disables the check.
    #[serde(default = "IdpConfig::default_empty")]
    pub audience: String,

    /// Claim holding the identifier used for authorization. Tokens without it
    /// fall back to `sub`.
    #[serde(default = "IdpConfig::default_username_claim")]
    pub username_claim: String,

    /// Clock skew tolerated when checking `exp` and `nbf`, in seconds.
    #[serde(default = "IdpConfig::default_leeway_secs")]
    pub leeway_secs: u64,

    /// Timeout for a JWKS fetch, in seconds. Must be greater than 0.
    #[serde(default = "IdpConfig::default_timeout_secs")]
    pub timeout_secs: u64,

    /// How long fetched signing keys are trusted before refreshing, in seconds.
    #[serde(default = "IdpConfig::default_jwks_refresh_secs")]
    pub jwks_refresh_secs: u64,

    /// How long verified tokens are remembered, in seconds. 0 disables the cache.
    #[serde(default = "IdpConfig::default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    #[serde(default = "IdpConfig::default_cache_capacity")]
    pub cache_capacity: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub enum IdpKind {
    #[serde(rename = "jwks")]
    Jwks,
    #[serde(rename = "pem")]
    Pem,
}

impl CommonConfig for IdpConfig {
    fn default() -> Self {
        Self {
            kind: Self::default_kind(),
            jwks_url: Self::default_empty(),
            public_key_path: Self::default_empty(),
            issuer: Self::default_empty(),
            audience: Self::default_empty(),
            username_claim: Self::default_username_claim(),
            leeway_secs: Self::default_leeway_secs(),
            timeout_secs: Self::default_timeout_secs(),
            jwks_refresh_secs: Self::default_jwks_refresh_secs(),
            cache_ttl_secs: Self::default_cache_ttl_secs(),
            cache_capacity: Self::default_cache_capacity(),
        }
    }

    fn complete(&mut self, ps: &PathSet) -> Result<()> {
        self.jwks_url = expandenv("idp.jwks_url", &self.jwks_url)?;
        self.public_key_path = expandenv("idp.public_key_path", &self.public_key_path)?;
        self.issuer = expandenv("idp.issuer", &self.issuer)?;
        self.audience = expandenv("idp.audience", &self.audience)?;

        if self.username_claim.is_empty() {
            bail!("idp.username_claim should not be empty");
        }
        if self.timeout_secs == 0 {
            bail!("idp.timeout_secs should not be 0");
        }

        match self.kind {
            IdpKind::Jwks => {
                if self.jwks_url.is_empty() {
                    bail!("idp.jwks_url is required when idp.kind is 'jwks'");
                }
                if !self.jwks_url.starts_with("http://") && !self.jwks_url.starts_with("https://")
                {
                    bail!("idp.jwks_url should be an http or https url");
                }
            }
            IdpKind::Pem => {
                if self.public_key_path.is_empty() {
                    let path = ps.pki_path.join("idp_public.pem");
                    self.public_key_path = format!("{}", path.display());
                }
            }
        }

        Ok(())
    }
}

impl IdpConfig {
    pub fn default_kind() -> IdpKind {
        IdpKind::Jwks
    }

    pub fn default_empty() -> String {
        String::new()
    }

    pub fn default_username_claim() -> String {
        String::from("preferred_username")
    }

    pub fn default_leeway_secs() -> u64 {
        30
    }

    pub fn default_timeout_secs() -> u64 {
        5
    }

    pub fn default_jwks_refresh_secs() -> u64 {
        5 * 60 // 5 minutes
    }

    pub fn default_cache_ttl_secs() -> u64 {
        0
    }

    pub fn default_cache_capacity() -> usize {
        1024
    }

    pub fn token_rules(&self) -> TokenRules {
        let optional = |s: &str| {
            if s.is_empty() {
                None
            } else {
                Some(s.to_string())
            }
        };
        TokenRules {
            issuer: optional(&self.issuer),
            audience: optional(&self.audience),
            username_claim: self.username_claim.clone(),
            leeway_secs: self.leeway_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete() {
        let dir = tempfile::tempdir().unwrap();
        let ps = PathSet::new_test(dir.path());

        // The default kind needs a jwks url
        let mut cfg = IdpConfig::default();
        assert!(cfg.complete(&ps).is_err());

        cfg.jwks_url = String::from("ftp://idp.example.com/certs");
        assert!(cfg.complete(&ps).is_err());

        cfg.jwks_url = String::from("https://idp.example.com/certs");
        cfg.complete(&ps).unwrap();
        let rules = cfg.token_rules();
        assert_eq!(rules.issuer, None);
        assert_eq!(rules.audience, None);
        assert_eq!(rules.username_claim, "preferred_username");
        assert_eq!(rules.leeway_secs, 30);

        let mut cfg = IdpConfig::default();
        cfg.kind = IdpKind::Pem;
        cfg.issuer = String::from("https://idp.example.com");
        cfg.complete(&ps).unwrap();
        assert_eq!(
            cfg.public_key_path,
            format!("{}", dir.path().join("pki").join("idp_public.pem").display())
        );
        assert_eq!(
            cfg.token_rules().issuer.as_deref(),
            Some("https://idp.example.com")
        );

        let mut cfg = IdpConfig::default();
        cfg.kind = IdpKind::Pem;
        cfg.timeout_secs = 0;
        assert!(cfg.complete(&ps).is_err());
    }

    #[test]
    fn test_parse() {
        let cfg: IdpConfig = toml::from_str(
            r#"
            kind = "pem"
            public_key_path = "/etc/keys/idp.pem"
            audience = "authgate"
            cache_ttl_secs = 60
            "#,
        )
        .unwrap();
        assert_eq!(cfg.kind, IdpKind::Pem);
        assert_eq!(cfg.audience, "authgate");
        assert_eq!(cfg.cache_ttl_secs, 60);
        assert_eq!(cfg.cache_capacity, 1024);
        assert_eq!(cfg.jwks_refresh_secs, 300);
    }
}
