use std::path::Path;

use anyhow::Result;
use log::info;

use super::config::{AuditConfig, AuditTarget};
use super::file::FileAuditSink;
use super::logging::LogAuditSink;
use super::union::UnionAuditSink;

pub struct AuditFactory;

impl AuditFactory {
    pub fn new() -> Self {
        Self
    }

    pub fn build_audit_sink(&self, cfg: &AuditConfig) -> Result<UnionAuditSink> {
        match cfg.target {
            AuditTarget::Log => {
                info!("Write audit records to the log");
                Ok(UnionAuditSink::Log(LogAuditSink::new()))
            }
            AuditTarget::File => {
                info!("Write audit records to {}", cfg.path);
                let sink = FileAuditSink::open(Path::new(&cfg.path))?;
                Ok(UnionAuditSink::File(sink))
            }
        }
    }
}
