use anyhow::{Context, Result};
use log::{info, warn};

use crate::decision::{AuthorizationDecision, Severity};

use super::{AuditSink, AUDIT_TARGET};

/// Writes each record as one JSON line to the process log under the `audit`
/// target. Elevated records are logged as warnings.
pub struct LogAuditSink;

impl LogAuditSink {
    pub fn new() -> Self {
        Self
    }
}

impl AuditSink for LogAuditSink {
    fn append(&self, record: &AuthorizationDecision) -> Result<()> {
        let line = serde_json::to_string(record).context("encode audit record")?;
        match record.severity {
            Severity::Elevated => warn!(target: AUDIT_TARGET, "{line}"),
            Severity::Normal => info!(target: AUDIT_TARGET, "{line}"),
        }
        Ok(())
    }
}
