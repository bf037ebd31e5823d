mod aggregate;
mod dedup;
mod parser;
mod paths;
mod pipeline;
mod session;
mod types;

pub use aggregate::{AggregateResult, BucketKey, DateRange, Dimension, NO_BRANCH, UsageTotals};
pub use dedup::{CanonicalRecord, CanonicalRecords};
pub use parser::{SYNTHETIC_MODEL, UNKNOWN_DATE, extract_usage_event_from_line};
pub use paths::{PROJECTS_DIR, default_claude_home};
pub use pipeline::{
    MAX_LINE_BYTES, ScanOptions, ScanOutput, aggregate_usage, aggregate_usage_with_pricing,
    collect_records, cutoff_for_days,
};
pub use session::{DELEGATE_DIR, delegate_dir, session_cost, session_records, session_records_with_limit};
pub use types::{IngestError, IngestIssue, Result, UsageEvent};
