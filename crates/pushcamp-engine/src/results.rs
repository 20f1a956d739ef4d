//! The append-only campaign result log.
//!
//! Comma-delimited rows `handle,accountId,result,status,statusMessage,timestamp`,
//! one per account per run lineage. The set of handles and account ids
//! already present is the dedup key a resumed run filters against. Rows are
//! only ever appended; the status message is wrapped in single quotes so the
//! leading columns stay parseable even when provider messages contain commas.

use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use pushcamp_core::error::{PushCampError, Result};
use pushcamp_core::types::{Account, ChallengeOutcome};

/// One finished row, ready to append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRow {
    pub handle: String,
    pub account_id: String,
    pub result: String,
    pub status: String,
    pub status_msg: String,
    pub timestamp: String,
}

impl ResultRow {
    pub fn from_outcome(account: &Account, outcome: &ChallengeOutcome) -> Self {
        let handle = if account.username.is_empty() {
            account.email.clone()
        } else {
            account.username.clone()
        };
        Self {
            handle,
            account_id: account.account_id.clone(),
            result: outcome.outcome.as_str().to_string(),
            status: outcome.status.clone(),
            status_msg: outcome.status_msg.clone(),
            timestamp: outcome.completed_at.to_rfc3339(),
        }
    }

    fn to_line(&self) -> String {
        format!(
            "{},{},{},{},'{}',{}",
            self.handle, self.account_id, self.result, self.status, self.status_msg, self.timestamp
        )
    }
}

/// Append-only log file plus the in-memory dedup set.
pub struct ResultLog {
    path: PathBuf,
    handles: HashSet<String>,
}

impl ResultLog {
    /// Start a fresh log at `path`, truncating anything already there.
    pub fn create(path: &Path) -> Result<Self> {
        std::fs::File::create(path).map_err(|e| {
            PushCampError::ResultLog(format!("unable to create {}: {e}", path.display()))
        })?;
        Ok(Self { path: path.to_path_buf(), handles: HashSet::new() })
    }

    /// Resume from an existing log. The file must exist; an empty file is a
    /// valid log with nothing to dedup.
    pub fn resume(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|_| {
            PushCampError::ResultLog(format!("resume file {} not found", path.display()))
        })?;

        let mut handles = HashSet::new();
        for line in content.lines() {
            let mut fields = line.split(',');
            // Only the first two columns can never contain embedded commas.
            if let Some(handle) = fields.next().map(str::trim).filter(|h| !h.is_empty()) {
                handles.insert(handle.to_string());
            }
            if let Some(id) = fields.next().map(str::trim).filter(|i| !i.is_empty()) {
                handles.insert(id.to_string());
            }
        }
        tracing::info!(
            "resuming from {} ({} prior entries)",
            path.display(),
            handles.len()
        );
        Ok(Self { path: path.to_path_buf(), handles })
    }

    /// Resume from the most recently modified file in `dir`.
    pub fn resume_latest(dir: &Path) -> Result<Self> {
        let mut newest: Option<(std::time::SystemTime, PathBuf)> = None;
        let entries = std::fs::read_dir(dir).map_err(|e| {
            PushCampError::ResultLog(format!("unable to read {}: {e}", dir.display()))
        })?;
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(std::time::SystemTime::UNIX_EPOCH);
            if newest.as_ref().is_none_or(|(t, _)| modified > *t) {
                newest = Some((modified, path));
            }
        }
        match newest {
            Some((_, path)) => Self::resume(&path),
            None => Err(PushCampError::ResultLog(format!(
                "no result files in {} to resume from",
                dir.display()
            ))),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Handles and account ids already recorded in this run lineage.
    pub fn handles(&self) -> &HashSet<String> {
        &self.handles
    }

    /// Append a batch of rows as one sequential write.
    pub fn append_rows(&mut self, rows: &[ResultRow]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let mut file = OpenOptions::new().append(true).open(&self.path).map_err(|e| {
            PushCampError::ResultLog(format!("unable to append to {}: {e}", self.path.display()))
        })?;
        let mut buf = String::new();
        for row in rows {
            buf.push_str(&row.to_line());
            buf.push('\n');
        }
        file.write_all(buf.as_bytes())?;
        file.flush()?;
        for row in rows {
            self.handles.insert(row.handle.clone());
            self.handles.insert(row.account_id.clone());
        }
        Ok(())
    }
}
