use std::io;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;
use usage_core::TokenUsage;

use crate::dedup::CanonicalRecord;

/// Provisional result of parsing one billable log line.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageEvent {
    pub request_id: Option<String>,
    pub model: String,
    /// Local calendar day (`YYYY-MM-DD`) or [`crate::UNKNOWN_DATE`].
    pub date: String,
    pub project: String,
    pub branch: Option<String>,
    pub usage: TokenUsage,
}

impl UsageEvent {
    pub fn into_record(self) -> (Option<String>, CanonicalRecord) {
        (
            self.request_id,
            CanonicalRecord {
                model: self.model,
                date: self.date,
                project: self.project,
                branch: self.branch,
                usage: self.usage,
            },
        )
    }
}

/// Non-fatal issues encountered during a scan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestIssue {
    pub file_path: String,
    pub message: String,
}

/// Errors emitted by the ingest pipeline.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("no projects directory found at {}", .0.display())]
    MissingProjectsDir(PathBuf),
    #[error("failed to read {}: {source}", .path.display())]
    ReadFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, IngestError>;
