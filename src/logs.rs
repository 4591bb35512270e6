use std::io::{self, IsTerminal};

use anyhow::{Context, Result};
use fern::colors::{Color, ColoredLevelConfig};
use log::LevelFilter;
use serde::{Deserialize, Serialize};

use crate::audit::AUDIT_TARGET;
use crate::config::{CommonConfig, PathSet};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LogsConfig {
    #[serde(default = "LogsConfig::default_level")]
    pub level: LogLevel,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    #[serde(rename = "error")]
    Error,
    #[serde(rename = "warning")]
    Warning,
    #[serde(rename = "info")]
    Info,
    #[serde(rename = "debug")]
    Debug,
}

impl CommonConfig for LogsConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }

    fn complete(&mut self, _ps: &PathSet) -> Result<()> {
        Ok(())
    }
}

impl LogsConfig {
    pub fn default_level() -> LogLevel {
        LogLevel::Info
    }

    pub fn init(&self) -> Result<()> {
        self.dispatch().apply().context("init logger")?;
        Ok(())
    }

    fn dispatch(&self) -> fern::Dispatch {
        let level = match self.level {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warning => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
        };

        let stdout = io::stdout();
        let is_terminal = stdout.is_terminal();

        let colors = ColoredLevelConfig::new()
            .info(Color::Green)
            .warn(Color::Yellow)
            .debug(Color::Magenta);

        fern::Dispatch::new()
            .format(move |out, message, record| {
                if is_terminal {
                    out.finish(format_args!(
                        "{} [{}] {}",
                        humantime::format_rfc3339_millis(std::time::SystemTime::now()),
                        colors.color(record.level()),
                        message
                    ))
                } else {
                    out.finish(format_args!(
                        "{} [{}] {}",
                        humantime::format_rfc3339_millis(std::time::SystemTime::now()),
                        record.level(),
                        message
                    ))
                }
            })
            .level(level)
            // Audit records are never filtered by the operational level
            .level_for(AUDIT_TARGET, level.max(LevelFilter::Info))
            .chain(std::io::stdout())
    }
}
