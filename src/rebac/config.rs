use anyhow::{bail, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::config::{expandenv, redact, CommonConfig, PathSet};

/// Authorization backend configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RebacConfig {
    /// Base url of the OpenFGA compatible server.
    #[serde(default = "RebacConfig::default_url")]
    pub url: String,

    /// The store holding the relationship tuples. Required.
    #[serde(default = "RebacConfig::default_empty")]
    pub store_id: String,

    /// Pin checks to one authorization model. Empty uses the latest model.
    #[serde(default = "RebacConfig::default_empty")]
    pub authorization_model_id: String,

    /// Preshared key sent as a bearer token. Empty sends no credentials.
    /// Supports `${ENV}` so the secret can stay out of the file.
    #[serde(default = "RebacConfig::default_empty", serialize_with = "redact")]
    pub api_token: String,

    /// Upper bound for a whole check call, in seconds. Must be greater than 0.
    #[serde(default = "RebacConfig::default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "RebacConfig::default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl CommonConfig for RebacConfig {
    fn default() -> Self {
        Self {
            url: Self::default_url(),
            store_id: Self::default_empty(),
            authorization_model_id: Self::default_empty(),
            api_token: Self::default_empty(),
            timeout_secs: Self::default_timeout_secs(),
            connect_timeout_secs: Self::default_connect_timeout_secs(),
        }
    }

    fn complete(&mut self, _ps: &PathSet) -> Result<()> {
        self.url = expandenv("rebac.url", &self.url)?;
        self.store_id = expandenv("rebac.store_id", &self.store_id)?;
        self.authorization_model_id =
            expandenv("rebac.authorization_model_id", &self.authorization_model_id)?;
        self.api_token = expandenv("rebac.api_token", &self.api_token)?;

        let parsed = match Url::parse(&self.url) {
            Ok(url) => url,
            Err(_) => bail!("invalid rebac.url '{}'", self.url),
        };
        match parsed.scheme() {
            "http" | "https" => {}
            _ => bail!(
                "invalid rebac.url scheme, expect 'http' or 'https', not '{}'",
                parsed.scheme()
            ),
        }

        if self.store_id.is_empty() {
            bail!("rebac.store_id is required");
        }
        if !self.store_id.chars().all(|c| c.is_ascii_alphanumeric()) {
            bail!("rebac.store_id should be alphanumeric");
        }

        if self.timeout_secs == 0 {
            bail!("rebac.timeout_secs should not be 0");
        }
        if self.connect_timeout_secs == 0 {
            bail!("rebac.connect_timeout_secs should not be 0");
        }

        Ok(())
    }
}

impl RebacConfig {
    pub fn default_url() -> String {
        String::from("http://127.0.0.1:8080")
    }

    pub fn default_empty() -> String {
        String::new()
    }

    pub fn default_timeout_secs() -> u64 {
        3
    }

    pub fn default_connect_timeout_secs() -> u64 {
        2
    }

    pub fn authorization_model_id(&self) -> Option<String> {
        if self.authorization_model_id.is_empty() {
            None
        } else {
            Some(self.authorization_model_id.clone())
        }
    }

    pub fn api_token(&self) -> Option<String> {
        if self.api_token.is_empty() {
            None
        } else {
            Some(self.api_token.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::env;

    use super::*;

    #[test]
    fn test_complete() {
        let dir = tempfile::tempdir().unwrap();
        let ps = PathSet::new_test(dir.path());

        // Store id is required
        let mut cfg = RebacConfig::default();
        assert!(cfg.complete(&ps).is_err());

        cfg.store_id = String::from("01HVMMBCMGZNT3SED4Z17ECXCA");
        cfg.complete(&ps).unwrap();
        assert_eq!(cfg.authorization_model_id(), None);
        assert_eq!(cfg.api_token(), None);

        env::set_var("AUTHGATE_TEST_FGA_TOKEN", "fga-secret");
        cfg.api_token = String::from("${AUTHGATE_TEST_FGA_TOKEN}");
        cfg.complete(&ps).unwrap();
        assert_eq!(cfg.api_token().as_deref(), Some("fga-secret"));

        cfg.url = String::from("unix:///run/openfga.sock");
        assert!(cfg.complete(&ps).is_err());

        cfg.url = String::from("not a url");
        assert!(cfg.complete(&ps).is_err());

        let mut cfg = RebacConfig::default();
        cfg.store_id = String::from("../admin");
        assert!(cfg.complete(&ps).is_err());

        let mut cfg = RebacConfig::default();
        cfg.store_id = String::from("01HVMMBCMGZNT3SED4Z17ECXCA");
        cfg.timeout_secs = 0;
        assert!(cfg.complete(&ps).is_err());
    }

    #[test]
    fn test_api_token_redacted() {
        let mut cfg = RebacConfig::default();
        let value = serde_json::to_value(&cfg).unwrap();
        assert_eq!(value["api_token"], "");

        cfg.api_token = String::from("fga-secret");
        let value = serde_json::to_value(&cfg).unwrap();
        assert_eq!(value["api_token"], "******");
        assert!(!value.to_string().contains("fga-secret"));

        let printed = toml::to_string(&cfg).unwrap();
        assert!(!printed.contains("fga-secret"));

        // Loading is unaffected
        let cfg: RebacConfig = toml::from_str("api_token = \"fga-secret\"").unwrap();
        assert_eq!(cfg.api_token, "fga-secret");
    }
}
