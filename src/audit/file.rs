use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};

use crate::decision::AuthorizationDecision;

use super::AuditSink;

/// Appends records as JSON lines to a local file.
pub struct FileAuditSink {
    file: Mutex<File>,
}

impl FileAuditSink {
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("open audit file '{}'", path.display()))?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl AuditSink for FileAuditSink {
    fn append(&self, record: &AuthorizationDecision) -> Result<()> {
        let mut line = serde_json::to_vec(record).context("encode audit record")?;
        line.push(b'\n');

        let mut file = match self.file.lock() {
            Ok(file) => file,
            Err(poisoned) => poisoned.into_inner(),
        };
        // One write per record keeps lines whole under O_APPEND
        file.write_all(&line).context("write audit file")?;
        file.flush().context("flush audit file")?;
        Ok(())
    }
}
