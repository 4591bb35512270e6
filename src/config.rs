use std::path::{Path, PathBuf};
use std::{env, fs, io};

use anyhow::{bail, Context, Result};
use clap::Args;
use log::warn;
use serde::de::DeserializeOwned;

/// Command line arguments shared by every entry point that loads configuration.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// The config directory. Default: $AUTHGATE_CONFIG_DIR, /etc/authgate (root)
    /// or ~/.config/authgate.
    #[arg(long)]
    pub config_dir: Option<PathBuf>,

    /// The data directory. Default: $AUTHGATE_DATA_DIR, /var/lib/authgate (root)
    /// or ~/.local/share/authgate.
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}

impl ConfigArgs {
    pub fn load<T>(&self, name: &str) -> Result<T>
    where
        T: CommonConfig + DeserializeOwned,
    {
        let ps = PathSet::new(self.config_dir.clone(), self.data_dir.clone())?;
        ps.load_config(name, T::default)
    }
}

pub struct PathSet {
    pub config_path: PathBuf,
    pub data_path: PathBuf,
    pub pki_path: PathBuf,
}

impl PathSet {
    pub fn new(config_path: Option<PathBuf>, data_path: Option<PathBuf>) -> Result<Self> {
        // Check if running as root (UID == 0)
        let is_root = unsafe { libc::geteuid() == 0 };

        let config_path = if let Some(path) = config_path {
            path
        } else if let Ok(path) = env::var("AUTHGATE_CONFIG_DIR") {
            PathBuf::from(path)
        } else if is_root {
            PathBuf::from("/etc/authgate")
        } else {
            Self::home_dir()?.join(".config").join("authgate")
        };

        let data_path = if let Some(path) = data_path {
            path
        } else if let Ok(path) = env::var("AUTHGATE_DATA_DIR") {
            PathBuf::from(path)
        } else if is_root {
            PathBuf::from("/var/lib/authgate")
        } else {
            Self::home_dir()?.join(".local").join("share").join("authgate")
        };

        // PKI path is always under config path
        let pki_path = config_path.join("pki");

        ensure_dir_exists(&config_path)
            .with_context(|| format!("ensure config directory: {}", config_path.display()))?;
        ensure_dir_exists(&data_path)
            .with_context(|| format!("ensure data directory: {}", data_path.display()))?;

        Ok(Self {
            config_path,
            data_path,
            pki_path,
        })
    }

    pub fn load_config<T, F>(&self, name: &str, default_func: F) -> Result<T>
    where
        T: CommonConfig + DeserializeOwned,
        F: FnOnce() -> T,
    {
        let path = self.config_path.join(format!("{name}.toml"));
        let mut cfg: T = match fs::read_to_string(&path) {
            Ok(s) => toml::from_str(&s).context("parse config toml")?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                warn!("Config file for {name} not found, using defaults");
                default_func()
            }
            Err(err) => {
                return Err(err).context(format!("read config file: {}", path.display()));
            }
        };

        cfg.complete(self).context("validate config")?;
        Ok(cfg)
    }

    #[cfg(test)]
    pub fn new_test(dir: &Path) -> Self {
        Self {
            config_path: dir.to_path_buf(),
            data_path: dir.to_path_buf(),
            pki_path: dir.join("pki"),
        }
    }

    fn home_dir() -> Result<PathBuf> {
        let dir = std::env::var_os("HOME") // Unix/Linux/macOS
            .or_else(|| std::env::var_os("USERPROFILE")) // Windows
            .map(PathBuf::from);
        match dir {
            Some(dir) => Ok(dir),
            None => {
                bail!("could not determine home directory, please specify config path manually")
            }
        }
    }
}

pub trait CommonConfig {
    fn default() -> Self;
    fn complete(&mut self, ps: &PathSet) -> Result<()>;
}

/// See: [`shellexpand::full`].
pub fn expandenv(name: &str, s: impl AsRef<str>) -> Result<String> {
    let s =
        shellexpand::full(s.as_ref()).with_context(|| format!("expand env value for '{name}'"))?;
    Ok(s.to_string())
}

/// Serializes a secret as `******`. An unset secret stays empty.
pub fn redact<S>(value: &str, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    if value.is_empty() {
        serializer.serialize_str("")
    } else {
        serializer.serialize_str("******")
    }
}

pub fn ensure_dir_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)?;
    }
    Ok(())
}
