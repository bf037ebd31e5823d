use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use usage_core::PricingTable;

use crate::dedup::CanonicalRecords;
use crate::parser::LineContext;
use crate::pipeline::{MAX_LINE_BYTES, is_log_path, scan_file};
use crate::types::{IngestError, Result};

/// Directory, next to a session transcript, holding delegated-agent logs.
pub const DELEGATE_DIR: &str = "subagents";

/// `<dir>/<stem>/subagents` for a transcript at `<dir>/<stem>.jsonl`.
pub fn delegate_dir(primary: &Path) -> PathBuf {
    primary.with_extension("").join(DELEGATE_DIR)
}

fn session_project(primary: &Path) -> String {
    primary
        .parent()
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn delegate_logs(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(IngestError::ReadFile {
                path: dir.to_path_buf(),
                source,
            });
        }
    };
    let mut logs = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && is_log_path(&path) {
            logs.push(path);
        }
    }
    logs.sort();
    Ok(logs)
}

/// Deduplicated records of one session: the primary transcript followed by
/// its delegate logs.
///
/// No date cutoff applies. A delegate log that cannot be read is logged and
/// left out; the primary transcript failing is an error.
pub fn session_records(primary: &Path) -> Result<CanonicalRecords> {
    session_records_with_limit(primary, MAX_LINE_BYTES)
}

pub fn session_records_with_limit(primary: &Path, max_line_bytes: usize) -> Result<CanonicalRecords> {
    let project = session_project(primary);
    let ctx = LineContext {
        project: &project,
        cutoff: None,
    };
    let mut records = CanonicalRecords::new();
    let scan = scan_file(primary, &ctx, max_line_bytes)?;
    records.extend(scan.events);

    for log in delegate_logs(&delegate_dir(primary))? {
        match scan_file(&log, &ctx, max_line_bytes) {
            Ok(scan) => records.extend(scan.events),
            Err(err) => warn!(path = %log.display(), error = %err, "skipping delegate log"),
        }
    }
    debug!(path = %primary.display(), records = records.len(), "session scanned");
    Ok(records)
}

/// Sum of per-record costs, each canonical record priced once.
pub fn session_cost(records: &CanonicalRecords, pricing: &PricingTable) -> f64 {
    records.total_cost(pricing)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delegate_dir_strips_extension() {
        assert_eq!(
            delegate_dir(Path::new("/p/proj/abc.jsonl")),
            PathBuf::from("/p/proj/abc/subagents")
        );
    }

    #[test]
    fn project_is_parent_directory_name() {
        assert_eq!(session_project(Path::new("/p/-home-me-web/abc.jsonl")), "-home-me-web");
    }

    #[test]
    fn missing_delegate_dir_is_empty() {
        let logs = delegate_logs(Path::new("/definitely/not/here/subagents")).expect("logs");
        assert!(logs.is_empty());
    }
}
