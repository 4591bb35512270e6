mod file;
mod logging;
mod union;

pub mod config;
pub mod factory;

pub use file::FileAuditSink;
pub use logging::LogAuditSink;
pub use union::UnionAuditSink;

use anyhow::Result;

use crate::decision::AuthorizationDecision;

/// Log target of the records written by [`LogAuditSink`].
pub const AUDIT_TARGET: &str = "audit";

/// Destination for authorization decision records.
///
/// Appending happens on the request path, so implementations should be quick.
/// A failed append is reported to the caller, which logs it and carries on;
/// it never changes the decision that was recorded.
pub trait AuditSink: Send + Sync {
    fn append(&self, record: &AuthorizationDecision) -> Result<()>;
}
