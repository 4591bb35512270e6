use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::config::{expandenv, CommonConfig, PathSet};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AuditConfig {
    /// Where decision records go: `log` (the process log) or `file`.
    #[serde(default = "AuditConfig::default_target")]
    pub target: AuditTarget,

    /// JSON lines file used when target is `file`.
    /// Default: {data_path}/audit.log
    #[serde(default = "AuditConfig::default_path")]
    pub path: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub enum AuditTarget {
    #[serde(rename = "log")]
    Log,
    #[serde(rename = "file")]
    File,
}

impl CommonConfig for AuditConfig {
    fn default() -> Self {
        Self {
            target: Self::default_target(),
            path: Self::default_path(),
        }
    }

    fn complete(&mut self, ps: &PathSet) -> Result<()> {
        self.path = expandenv("audit.path", &self.path)?;
        if self.path.is_empty() {
            let path = ps.data_path.join("audit.log");
            self.path = format!("{}", path.display());
        }
        Ok(())
    }
}

impl AuditConfig {
    pub fn default_target() -> AuditTarget {
        AuditTarget::Log
    }

    pub fn default_path() -> String {
        String::new()
    }
}
