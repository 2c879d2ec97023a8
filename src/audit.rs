//! Append-only audit trail of authorization decisions
//!
//! Every decision is recorded, allowed and rejected both - rejections are
//! the higher-value signal for spotting abuse. The sink is best-effort: a
//! write failure is reported to the diagnostic stream and swallowed, never
//! propagated into the authorization flow it observes.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Error;

/// One authorization decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,

    /// Operation name ("transfer", "sweep_all", "confirm").
    pub operation: String,

    /// Redacted input parameters.
    pub params: serde_json::Value,

    /// Short outcome summary.
    pub outcome: String,

    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,

    /// Amount as a decimal display string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,

    /// Whether the guard sequence allowed the request. Distinct from
    /// `success`: an allowed request can still fail at execution.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl AuditRecord {
    /// A request that passed the guard sequence.
    pub fn allowed(
        operation: &str,
        destination: Option<String>,
        amount: Option<String>,
        outcome: &str,
        success: bool,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            operation: operation.to_string(),
            params: serde_json::json!({
                "destination": destination,
                "amount": amount,
            }),
            outcome: outcome.to_string(),
            success,
            destination,
            amount,
            allowed: Some(true),
            reason: None,
        }
    }

    /// A request denied by a guard, with the specific reason.
    pub fn rejected(
        operation: &str,
        destination: Option<String>,
        amount: Option<String>,
        error: &Error,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            operation: operation.to_string(),
            params: serde_json::json!({
                "destination": destination,
                "amount": amount,
            }),
            outcome: error.reason_tag().to_string(),
            success: false,
            destination,
            amount,
            allowed: Some(false),
            reason: Some(error.to_string()),
        }
    }
}

/// Best-effort durable JSON-lines sink with a mirrored diagnostic stream.
pub struct AuditSink {
    writer: Option<Mutex<File>>,
}

impl AuditSink {
    /// Open the sink in append mode. A missing path disables the durable
    /// copy but keeps the diagnostic mirror.
    pub fn open(path: Option<&Path>) -> Self {
        let writer = path.and_then(|p| {
            match OpenOptions::new().create(true).append(true).open(p) {
                Ok(file) => Some(Mutex::new(file)),
                Err(e) => {
                    warn!("audit log {} unavailable: {}", p.display(), e);
                    None
                }
            }
        });
        Self { writer }
    }

    /// A sink with no durable destination (tests, dry runs).
    pub fn disabled() -> Self {
        Self { writer: None }
    }

    /// Append one record. Never fails the caller.
    pub fn record(&self, record: &AuditRecord) {
        if record.success {
            info!(
                operation = %record.operation,
                outcome = %record.outcome,
                destination = record.destination.as_deref().unwrap_or("-"),
                "authorization decision"
            );
        } else {
            warn!(
                operation = %record.operation,
                outcome = %record.outcome,
                reason = record.reason.as_deref().unwrap_or("-"),
                "authorization rejected"
            );
        }

        let Some(writer) = &self.writer else {
            return;
        };
        let line = match serde_json::to_string(record) {
            Ok(line) => line,
            Err(e) => {
                warn!("audit record not serializable: {}", e);
                return;
            }
        };
        match writer.lock() {
            Ok(mut file) => {
                if let Err(e) = writeln!(file, "{}", line) {
                    warn!("audit append failed: {}", e);
                }
            }
            Err(_) => warn!("audit writer poisoned; record dropped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_appends_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.log");
        let sink = AuditSink::open(Some(path.as_path()));

        sink.record(&AuditRecord::allowed(
            "transfer",
            Some("4AAA".into()),
            Some("0.1".into()),
            "executed",
            true,
        ));
        sink.record(&AuditRecord::rejected(
            "transfer",
            Some("4BBB".into()),
            Some("5".into()),
            &Error::TransfersDisabled,
        ));

        let mut content = String::new();
        File::open(&path)
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: AuditRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.allowed, Some(true));
        assert!(first.success);

        let second: AuditRecord = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second.allowed, Some(false));
        assert_eq!(second.outcome, "transfers_disabled");
        assert!(second.reason.is_some());
    }

    #[test]
    fn test_write_failure_is_swallowed() {
        // a directory path cannot be opened as a file
        let dir = tempfile::tempdir().unwrap();
        let sink = AuditSink::open(Some(dir.path()));

        // must not panic or error
        sink.record(&AuditRecord::rejected(
            "sweep_all",
            None,
            None,
            &Error::NoUnlockedBalance,
        ));
    }
}
