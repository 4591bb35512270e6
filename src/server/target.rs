use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::config::{expandenv, CommonConfig, PathSet};
use crate::rebac;

/// Controls how request paths and methods become authorization targets.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TargetConfig {
    /// Paths below this prefix are read as `/<type>/<id>/...`.
    #[serde(default = "TargetConfig::default_prefix")]
    pub prefix: String,

    /// Object checked for paths that do not name one.
    #[serde(default = "TargetConfig::default_object")]
    pub default_object: String,

    /// Relation required for GET, HEAD and OPTIONS.
    #[serde(default = "TargetConfig::default_read_relation")]
    pub read_relation: String,

    /// Relation required for POST, PUT and PATCH.
    #[serde(default = "TargetConfig::default_write_relation")]
    pub write_relation: String,

    /// Relation required for DELETE.
    #[serde(default = "TargetConfig::default_delete_relation")]
    pub delete_relation: String,
}

impl CommonConfig for TargetConfig {
    fn default() -> Self {
        Self {
            prefix: Self::default_prefix(),
            default_object: Self::default_object(),
            read_relation: Self::default_read_relation(),
            write_relation: Self::default_write_relation(),
            delete_relation: Self::default_delete_relation(),
        }
    }

    fn complete(&mut self, _ps: &PathSet) -> Result<()> {
        self.prefix = expandenv("target.prefix", &self.prefix)?;
        if !self.prefix.starts_with('/') {
            bail!("target.prefix should start with '/'");
        }
        let trimmed = self.prefix.trim_end_matches('/');
        self.prefix = if trimmed.is_empty() {
            String::from("/")
        } else {
            trimmed.to_string()
        };

        if let Err(reason) = rebac::validate_object(&self.default_object) {
            bail!("invalid target.default_object '{}': {reason}", self.default_object);
        }
        for (name, relation) in [
            ("read_relation", &self.read_relation),
            ("write_relation", &self.write_relation),
            ("delete_relation", &self.delete_relation),
        ] {
            if let Err(reason) = rebac::validate_relation(relation) {
                bail!("invalid target.{name} '{relation}': {reason}");
            }
        }

        Ok(())
    }
}

impl TargetConfig {
    pub fn default_prefix() -> String {
        String::from("/api")
    }

    pub fn default_object() -> String {
        String::from("service:authgate")
    }

    pub fn default_read_relation() -> String {
        String::from("viewer")
    }

    pub fn default_write_relation() -> String {
        String::from("editor")
    }

    pub fn default_delete_relation() -> String {
        String::from("owner")
    }
}

/// The relation and object a request needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub relation: String,
    pub object: String,
}

pub struct TargetResolver {
    prefix: String,
    default_object: String,
    read_relation: String,
    write_relation: String,
    delete_relation: String,
}

impl TargetResolver {
    pub fn new(cfg: &TargetConfig) -> Self {
        Self {
            prefix: cfg.prefix.clone(),
            default_object: cfg.default_object.clone(),
            read_relation: cfg.read_relation.clone(),
            write_relation: cfg.write_relation.clone(),
            delete_relation: cfg.delete_relation.clone(),
        }
    }

    /// Maps a request to its target. The path may carry a query string.
    ///
    /// Methods outside the known set resolve to an empty relation, which the
    /// query grammar rejects, so such requests are always denied.
    pub fn resolve(&self, method: &str, path: &str) -> Target {
        Target {
            relation: self.relation(method),
            object: self.object(path),
        }
    }

    fn relation(&self, method: &str) -> String {
        let relation = match method {
            "GET" | "HEAD" | "OPTIONS" => &self.read_relation,
            "POST" | "PUT" | "PATCH" => &self.write_relation,
            "DELETE" => &self.delete_relation,
            _ => return String::new(),
        };
        relation.clone()
    }

    fn object(&self, path: &str) -> String {
        let path = match path.split_once(['?', '#']) {
            Some((path, _)) => path,
            None => path,
        };

        let rest = if self.prefix == "/" {
            Some(path)
        } else {
            match path.strip_prefix(self.prefix.as_str()) {
                Some(rest) if rest.is_empty() || rest.starts_with('/') => Some(rest),
                _ => None,
            }
        };

        let mut segments = match rest {
            Some(rest) => rest.split('/').filter(|s| !s.is_empty()),
            None => return self.default_object.clone(),
        };
        match (segments.next(), segments.next()) {
            (Some(kind), Some(id)) => format!("{kind}:{id}"),
            _ => self.default_object.clone(),
        }
    }
}
