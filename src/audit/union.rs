use anyhow::Result;

use crate::decision::AuthorizationDecision;

use super::file::FileAuditSink;
use super::logging::LogAuditSink;
use super::AuditSink;

pub enum UnionAuditSink {
    Log(LogAuditSink),
    File(FileAuditSink),
}

impl AuditSink for UnionAuditSink {
    fn append(&self, record: &AuthorizationDecision) -> Result<()> {
        match self {
            UnionAuditSink::Log(sink) => sink.append(record),
            UnionAuditSink::File(sink) => sink.append(record),
        }
    }
}
