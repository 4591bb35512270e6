use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::audit::config::AuditConfig;
use crate::config::{expandenv, CommonConfig, PathSet};
use crate::decision::Environment;
use crate::idp::config::IdpConfig;
use crate::logs::LogsConfig;
use crate::rebac::config::RebacConfig;

use super::target::TargetConfig;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "ServerConfig::default_bind")]
    pub bind: String,

    #[serde(default = "ServerConfig::default_ssl")]
    pub ssl: bool,

    #[serde(default = "ServerConfig::default_cert_path")]
    pub cert_path: String,

    #[serde(default = "ServerConfig::default_key_path")]
    pub key_path: String,

    #[serde(default = "ServerConfig::default_keep_alive_secs")]
    pub keep_alive_secs: u64,

    #[serde(default = "ServerConfig::default_workers")]
    pub workers: u64,

    #[serde(default = "ServerConfig::default_environment")]
    pub environment: Environment,

    /// Only honored outside production.
    #[serde(default = "ServerConfig::default_allow_fallback")]
    pub allow_fallback: bool,

    #[serde(default = "LogsConfig::default")]
    pub logs: LogsConfig,

    #[serde(default = "IdpConfig::default")]
    pub idp: IdpConfig,

    #[serde(default = "RebacConfig::default")]
    pub rebac: RebacConfig,

    #[serde(default = "AuditConfig::default")]
    pub audit: AuditConfig,

    #[serde(default = "TargetConfig::default")]
    pub target: TargetConfig,
}

impl CommonConfig for ServerConfig {
    fn default() -> Self {
        Self {
            bind: Self::default_bind(),
            ssl: Self::default_ssl(),
            cert_path: Self::default_cert_path(),
            key_path: Self::default_key_path(),
            keep_alive_secs: Self::default_keep_alive_secs(),
            workers: Self::default_workers(),
            environment: Self::default_environment(),
            allow_fallback: Self::default_allow_fallback(),
            logs: LogsConfig::default(),
            idp: IdpConfig::default(),
            rebac: RebacConfig::default(),
            audit: AuditConfig::default(),
            target: TargetConfig::default(),
        }
    }

    fn complete(&mut self, ps: &PathSet) -> Result<()> {
        self.bind = expandenv("bind", &self.bind)?;
        if self.bind.is_empty() {
            bail!("bind cannot be empty");
        }

        self.cert_path = expandenv("cert_path", &self.cert_path)?;
        if self.cert_path.is_empty() {
            let path = ps.pki_path.join("server.crt");
            self.cert_path = format!("{}", path.display());
        }

        self.key_path = expandenv("key_path", &self.key_path)?;
        if self.key_path.is_empty() {
            let path = ps.pki_path.join("server.key");
            self.key_path = format!("{}", path.display());
        }

        self.logs.complete(ps).context("logs")?;
        self.idp.complete(ps).context("idp")?;
        self.rebac.complete(ps).context("rebac")?;
        self.audit.complete(ps).context("audit")?;
        self.target.complete(ps).context("target")?;

        Ok(())
    }
}

impl ServerConfig {
    pub fn default_bind() -> String {
        String::from("127.0.0.1:7890")
    }

    pub fn default_ssl() -> bool {
        false
    }

    pub fn default_cert_path() -> String {
        String::new()
    }

    pub fn default_key_path() -> String {
        String::new()
    }

    pub fn default_keep_alive_secs() -> u64 {
        0
    }

    pub fn default_workers() -> u64 {
        0
    }

    pub fn default_environment() -> Environment {
        Environment::Production
    }

    pub fn default_allow_fallback() -> bool {
        false
    }
}
