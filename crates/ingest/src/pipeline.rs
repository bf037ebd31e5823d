use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Component, Path};
use std::time::Instant;

use chrono::{DateTime, Days, Duration, Local, NaiveTime, TimeZone};
use tracing::{debug, warn};
use usage_core::PricingTable;
use walkdir::{DirEntry, WalkDir};

use crate::aggregate::AggregateResult;
use crate::dedup::CanonicalRecords;
use crate::parser::{FileScan, LineContext, scan_reader};
use crate::paths::PROJECTS_DIR;
use crate::types::{IngestError, IngestIssue, Result};

/// Longest line accepted before a file is treated as unreadable.
pub const MAX_LINE_BYTES: usize = 100 * 1024 * 1024;

/// Inputs of a scan over the projects tree.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Days of history to include, today counting as one. `0` disables the
    /// cutoff.
    pub days: u32,
    /// Case-insensitive substring matched against project directory names.
    pub project_filter: Option<String>,
    /// Wall clock used for the cutoff; `None` reads the local clock.
    pub reference: Option<DateTime<Local>>,
    pub max_line_bytes: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            days: 0,
            project_filter: None,
            reference: None,
            max_line_bytes: MAX_LINE_BYTES,
        }
    }
}

impl ScanOptions {
    pub fn new(days: u32, project_filter: Option<String>) -> Self {
        Self {
            days,
            project_filter: project_filter.filter(|filter| !filter.is_empty()),
            ..Self::default()
        }
    }

    pub fn cutoff(&self) -> Option<DateTime<Local>> {
        let reference = self.reference.unwrap_or_else(Local::now);
        cutoff_for_days(self.days, reference)
    }
}

/// Local midnight `days - 1` days before `reference`.
pub fn cutoff_for_days(days: u32, reference: DateTime<Local>) -> Option<DateTime<Local>> {
    if days == 0 {
        return None;
    }
    let day = reference
        .date_naive()
        .checked_sub_days(Days::new(u64::from(days - 1)))?;
    let midnight = day.and_time(NaiveTime::MIN);
    // Midnight can fall in a DST gap; the first valid instant after it is used.
    Local
        .from_local_datetime(&midnight)
        .earliest()
        .or_else(|| Local.from_local_datetime(&(midnight + Duration::hours(1))).earliest())
}

/// Canonical records plus walk counters, before pricing.
#[derive(Debug, Default)]
pub struct ScanOutput {
    pub records: CanonicalRecords,
    pub files_walked: usize,
    pub files_skipped: usize,
    pub parse_errors: usize,
    pub issues: Vec<IngestIssue>,
}

pub(crate) fn is_log_path(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|value| value.to_str()),
        Some("jsonl")
    )
}

fn matches_filter(entry: &DirEntry, filter: &str) -> bool {
    entry
        .file_name()
        .to_string_lossy()
        .to_lowercase()
        .contains(filter)
}

// First path component under the projects directory.
fn project_id(projects_dir: &Path, path: &Path) -> Option<String> {
    match path.strip_prefix(projects_dir).ok()?.components().next()? {
        Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
        _ => None,
    }
}

fn modified_before(path: &Path, cutoff: Option<&DateTime<Local>>) -> bool {
    let Some(cutoff) = cutoff else {
        return false;
    };
    let modified = fs::metadata(path).and_then(|metadata| metadata.modified());
    match modified {
        Ok(modified) => DateTime::<Local>::from(modified) < *cutoff,
        // Unknown mtime: read the file and let the per-event cutoff decide.
        Err(_) => false,
    }
}

pub(crate) fn scan_file(path: &Path, ctx: &LineContext<'_>, max_line_bytes: usize) -> Result<FileScan> {
    let read_error = |source| IngestError::ReadFile {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(read_error)?;
    let source = path.to_string_lossy();
    scan_reader(BufReader::new(file), &source, ctx, max_line_bytes).map_err(read_error)
}

/// Walks `<base_dir>/projects` and folds every billable event into the
/// canonical record store.
///
/// Files are visited in a stable, name-sorted order. A file that fails to
/// read part way contributes nothing; it is recorded as an issue instead.
pub fn collect_records(base_dir: &Path, options: &ScanOptions) -> Result<ScanOutput> {
    let projects_dir = base_dir.join(PROJECTS_DIR);
    if !projects_dir.is_dir() {
        return Err(IngestError::MissingProjectsDir(projects_dir));
    }
    let cutoff = options.cutoff();
    let filter = options
        .project_filter
        .as_deref()
        .filter(|filter| !filter.is_empty())
        .map(str::to_lowercase);

    let mut output = ScanOutput::default();
    let walker = WalkDir::new(&projects_dir)
        .follow_links(false)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| match filter.as_deref() {
            Some(filter) if entry.depth() == 1 => matches_filter(entry, filter),
            _ => true,
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let file_path = err
                    .path()
                    .map(|path| path.to_string_lossy().into_owned())
                    .unwrap_or_else(|| projects_dir.to_string_lossy().into_owned());
                warn!(path = %file_path, error = %err, "skipping unreadable entry");
                output.issues.push(IngestIssue {
                    file_path,
                    message: err.to_string(),
                });
                continue;
            }
        };
        if !entry.file_type().is_file() || !is_log_path(entry.path()) {
            continue;
        }
        let path = entry.path();
        if modified_before(path, cutoff.as_ref()) {
            output.files_skipped += 1;
            continue;
        }
        let Some(project) = project_id(&projects_dir, path) else {
            continue;
        };
        output.files_walked += 1;

        let ctx = LineContext {
            project: &project,
            cutoff,
        };
        match scan_file(path, &ctx, options.max_line_bytes) {
            Ok(scan) => {
                output.parse_errors += scan.parse_errors;
                output.records.extend(scan.events);
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping log file");
                output.issues.push(IngestIssue {
                    file_path: path.to_string_lossy().into_owned(),
                    message: err.to_string(),
                });
            }
        }
    }
    Ok(output)
}

impl AggregateResult {
    pub fn from_scan(scan: ScanOutput, pricing: &PricingTable) -> Self {
        let mut result = Self::from_records(&scan.records, pricing);
        result.files_walked = scan.files_walked;
        result.files_skipped = scan.files_skipped;
        result.parse_errors = scan.parse_errors;
        result.issues = scan.issues;
        result
    }
}

/// Scans `base_dir` and aggregates with the builtin pricing table.
pub fn aggregate_usage(base_dir: &Path, options: &ScanOptions) -> Result<AggregateResult> {
    aggregate_usage_with_pricing(base_dir, options, PricingTable::builtin())
}

pub fn aggregate_usage_with_pricing(
    base_dir: &Path,
    options: &ScanOptions,
    pricing: &PricingTable,
) -> Result<AggregateResult> {
    let started = Instant::now();
    let scan = collect_records(base_dir, options)?;
    let result = AggregateResult::from_scan(scan, pricing);
    debug!(
        files_walked = result.files_walked,
        files_skipped = result.files_skipped,
        records = result.record_count,
        parse_errors = result.parse_errors,
        issues = result.issues.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "usage scan complete"
    );
    Ok(result)
}
