use std::fmt::Write as _;
use std::io::{self, BufRead, Read};

use chrono::{DateTime, Local};
use serde::Deserialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use usage_core::TokenUsage;

use crate::dedup::CanonicalRecord;
use crate::types::UsageEvent;

/// Model id of zero-usage placeholders written for rate limits and errors.
pub const SYNTHETIC_MODEL: &str = "<synthetic>";
/// Date bucket for events whose timestamp is missing or unparseable.
pub const UNKNOWN_DATE: &str = "unknown";

const ASSISTANT_TYPE: &str = "assistant";
const ASSISTANT_MARKERS: [&[u8]; 2] = [br#""type":"assistant""#, br#""type": "assistant""#];
const PLACEHOLDER_PREFIX: &str = "noid:";

/// Per-file inputs for line extraction.
pub(crate) struct LineContext<'a> {
    pub project: &'a str,
    pub cutoff: Option<DateTime<Local>>,
}

#[derive(Debug, Default)]
pub(crate) struct LineOutcome {
    pub event: Option<UsageEvent>,
    pub parse_error: bool,
}

impl LineOutcome {
    fn ignored() -> Self {
        Self::default()
    }

    fn malformed() -> Self {
        Self {
            event: None,
            parse_error: true,
        }
    }
}

/// Events and parse error count from one fully read file.
#[derive(Debug, Default)]
pub(crate) struct FileScan {
    pub events: Vec<(String, CanonicalRecord)>,
    pub parse_errors: usize,
}

fn contains_bytes(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}

/// Cheap check run before JSON parsing. Accepts both compact and spaced
/// spellings of the assistant discriminant so no billable line is rejected.
pub(crate) fn passes_prefilter(line: &[u8]) -> bool {
    ASSISTANT_MARKERS
        .iter()
        .any(|marker| contains_bytes(line, marker))
}

fn find_string<'a>(value: &'a Value, paths: &[&[&str]]) -> Option<&'a str> {
    for path in paths {
        let mut current = value;
        let mut ok = true;
        for key in *path {
            if let Some(next) = current.get(*key) {
                current = next;
            } else {
                ok = false;
                break;
            }
        }
        if ok
            && let Some(found) = current.as_str()
            && !found.is_empty()
        {
            return Some(found);
        }
    }
    None
}

fn parse_json_line(line: &[u8]) -> Option<Value> {
    serde_json::from_slice(line).ok()
}

pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Local>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|parsed| parsed.with_timezone(&Local))
}

fn local_date(ts: &DateTime<Local>) -> String {
    ts.format("%Y-%m-%d").to_string()
}

/// Resolves the date bucket of an event. `None` means the event is dropped;
/// the flag reports an unparseable timestamp.
fn resolve_date(raw: Option<&Value>, cutoff: Option<&DateTime<Local>>) -> (Option<String>, bool) {
    let unbounded = || cutoff.is_none().then(|| UNKNOWN_DATE.to_string());
    let raw = match raw {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) if text.is_empty() => None,
        Some(value) => Some(value),
    };
    let Some(raw) = raw else {
        return (unbounded(), false);
    };
    match raw.as_str().and_then(parse_timestamp) {
        Some(ts) => {
            if let Some(cutoff) = cutoff
                && ts < *cutoff
            {
                return (None, false);
            }
            (Some(local_date(&ts)), false)
        }
        None => (unbounded(), true),
    }
}

fn extract_request_id(value: &Value) -> Option<String> {
    find_string(value, &[&["requestId"], &["request_id"]]).map(str::to_string)
}

fn extract_branch(value: &Value) -> Option<String> {
    find_string(value, &[&["gitBranch"], &["git_branch"]]).map(str::to_string)
}

pub(crate) fn extract_usage_event_from_value(obj: &Value, ctx: &LineContext<'_>) -> LineOutcome {
    if obj.get("type").and_then(Value::as_str) != Some(ASSISTANT_TYPE) {
        return LineOutcome::ignored();
    }
    let Some(message) = obj.get("message") else {
        return LineOutcome::ignored();
    };
    let Some(usage) = message.get("usage").filter(|usage| !usage.is_null()) else {
        return LineOutcome::ignored();
    };
    let Some(model) = find_string(message, &[&["model"]]) else {
        return LineOutcome::ignored();
    };
    if model == SYNTHETIC_MODEL {
        return LineOutcome::ignored();
    }
    let Ok(usage) = TokenUsage::deserialize(usage) else {
        return LineOutcome::malformed();
    };
    let (date, parse_error) = resolve_date(obj.get("timestamp"), ctx.cutoff.as_ref());
    let event = date.map(|date| UsageEvent {
        request_id: extract_request_id(obj),
        model: model.to_string(),
        date,
        project: ctx.project.to_string(),
        branch: extract_branch(obj),
        usage,
    });
    LineOutcome { event, parse_error }
}

pub(crate) fn parse_line(line: &[u8], ctx: &LineContext<'_>) -> LineOutcome {
    if !passes_prefilter(line) {
        return LineOutcome::ignored();
    }
    let Some(obj) = parse_json_line(line) else {
        return LineOutcome::malformed();
    };
    extract_usage_event_from_value(&obj, ctx)
}

/// Parses one log line without a date cutoff.
pub fn extract_usage_event_from_line(line: &str, project: &str) -> Option<UsageEvent> {
    let ctx = LineContext {
        project,
        cutoff: None,
    };
    parse_line(line.as_bytes(), &ctx).event
}

fn hex_digest(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(&mut out, "{:02x}", byte);
    }
    out
}

/// Stand-in request id for events that carry none. Unique per source line and
/// disjoint from real ids through its prefix.
pub(crate) fn placeholder_request_id(source: &str, line_number: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hasher.update(b":");
    hasher.update(line_number.to_string().as_bytes());
    format!("{}{}", PLACEHOLDER_PREFIX, hex_digest(&hasher.finalize()))
}

/// Reads one line into `buf`, failing instead of truncating when the line is
/// longer than `limit` bytes.
fn read_bounded_line<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>, limit: usize) -> io::Result<usize> {
    buf.clear();
    let max = u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1);
    let read = reader.by_ref().take(max).read_until(b'\n', buf)?;
    if read > limit && buf.last() != Some(&b'\n') {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("line exceeds {} bytes", limit),
        ));
    }
    Ok(read)
}

fn trim_line_end(line: &[u8]) -> &[u8] {
    let mut end = line.len();
    while end > 0 && matches!(line[end - 1], b'\n' | b'\r') {
        end -= 1;
    }
    &line[..end]
}

pub(crate) fn scan_reader<R: BufRead>(
    mut reader: R,
    source: &str,
    ctx: &LineContext<'_>,
    max_line_bytes: usize,
) -> io::Result<FileScan> {
    let mut scan = FileScan::default();
    let mut buf = Vec::new();
    let mut line_number = 0usize;
    while read_bounded_line(&mut reader, &mut buf, max_line_bytes)? > 0 {
        line_number += 1;
        let line = trim_line_end(&buf);
        if line.is_empty() {
            continue;
        }
        let outcome = parse_line(line, ctx);
        if outcome.parse_error {
            scan.parse_errors += 1;
        }
        if let Some(event) = outcome.event {
            let (request_id, record) = event.into_record();
            let request_id =
                request_id.unwrap_or_else(|| placeholder_request_id(source, line_number));
            scan.events.push((request_id, record));
        }
    }
    Ok(scan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const LINE: &str = r#"{"type":"assistant","requestId":"req_1","timestamp":"2026-02-18T10:00:00Z","gitBranch":"main","message":{"model":"claude-opus-4-6","role":"assistant","usage":{"input_tokens":100,"output_tokens":50,"cache_read_input_tokens":20,"cache_creation_input_tokens":30,"cache_creation":{"ephemeral_5m_input_tokens":10,"ephemeral_1h_input_tokens":20}}}}"#;

    fn ctx(cutoff: Option<DateTime<Local>>) -> LineContext<'static> {
        LineContext {
            project: "proj",
            cutoff,
        }
    }

    fn expected_local_date(raw: &str) -> String {
        local_date(&parse_timestamp(raw).expect("timestamp"))
    }

    #[test]
    fn extracts_assistant_usage_event() {
        let event = extract_usage_event_from_line(LINE, "proj").expect("event");
        assert_eq!(event.request_id.as_deref(), Some("req_1"));
        assert_eq!(event.model, "claude-opus-4-6");
        assert_eq!(event.project, "proj");
        assert_eq!(event.branch.as_deref(), Some("main"));
        assert_eq!(event.date, expected_local_date("2026-02-18T10:00:00Z"));
        assert_eq!(event.usage.input_tokens, 100);
        assert_eq!(event.usage.cache_write().one_hour, 20);
    }

    #[test]
    fn prefilter_accepts_spaced_discriminant() {
        let spaced = r#"{"type": "assistant", "requestId": "req_2", "timestamp": "2026-02-18T10:00:00Z", "message": {"model": "claude-opus-4-6", "usage": {"input_tokens": 1, "output_tokens": 2}}}"#;
        assert!(passes_prefilter(spaced.as_bytes()));
        let event = extract_usage_event_from_line(spaced, "proj").expect("event");
        assert_eq!(event.request_id.as_deref(), Some("req_2"));
        assert_eq!(event.usage.output_tokens, 2);
    }

    #[test]
    fn prefilter_rejects_other_types() {
        let user = r#"{"type":"user","message":{"role":"user","content":"hello"},"timestamp":"2026-02-18T10:00:00Z"}"#;
        assert!(!passes_prefilter(user.as_bytes()));
        let outcome = parse_line(user.as_bytes(), &ctx(None));
        assert!(outcome.event.is_none());
        assert!(!outcome.parse_error);
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let outcome = parse_line(br#"{"type":"assistant", broken"#, &ctx(None));
        assert!(outcome.event.is_none());
        assert!(outcome.parse_error);
    }

    #[test]
    fn skips_synthetic_placeholder() {
        let line = LINE.replace("claude-opus-4-6", SYNTHETIC_MODEL);
        let outcome = parse_line(line.as_bytes(), &ctx(None));
        assert!(outcome.event.is_none());
        assert!(!outcome.parse_error);
    }

    #[test]
    fn null_token_counts_keep_the_event() {
        let line = r#"{"type":"assistant","requestId":"req_null","timestamp":"2026-02-18T10:00:00Z","message":{"model":"claude-opus-4-6","usage":{"input_tokens":100,"output_tokens":50,"cache_read_input_tokens":null,"cache_creation_input_tokens":null,"cache_creation":null}}}"#;
        let outcome = parse_line(line.as_bytes(), &ctx(None));
        assert!(!outcome.parse_error);
        let event = outcome.event.expect("event");
        assert_eq!(event.usage.input_tokens, 100);
        assert_eq!(event.usage.output_tokens, 50);
        assert_eq!(event.usage.cache_read_input_tokens, 0);
        assert_eq!(event.usage.cache_write().five_minute, 0);
    }

    #[test]
    fn skips_lines_without_usage_or_model() {
        let no_usage = r#"{"type":"assistant","requestId":"r","message":{"model":"claude-opus-4-6"}}"#;
        let no_model = r#"{"type":"assistant","requestId":"r","message":{"usage":{"input_tokens":1}}}"#;
        assert!(extract_usage_event_from_line(no_usage, "p").is_none());
        assert!(extract_usage_event_from_line(no_model, "p").is_none());
    }

    #[test]
    fn discriminant_inside_content_is_not_enough() {
        let line = r#"{"type":"user","message":{"content":"\"type\":\"assistant\"","model":"m","usage":{}}}"#;
        assert!(extract_usage_event_from_line(line, "p").is_none());
    }

    #[test]
    fn bad_timestamp_without_cutoff_goes_to_unknown() {
        let line = LINE.replace("2026-02-18T10:00:00Z", "yesterday");
        let outcome = parse_line(line.as_bytes(), &ctx(None));
        assert!(outcome.parse_error);
        assert_eq!(outcome.event.expect("event").date, UNKNOWN_DATE);
    }

    #[test]
    fn bad_timestamp_with_cutoff_is_dropped() {
        let cutoff = Local.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).single();
        let line = LINE.replace("2026-02-18T10:00:00Z", "2026-02-18 10:00");
        let outcome = parse_line(line.as_bytes(), &ctx(cutoff));
        assert!(outcome.parse_error);
        assert!(outcome.event.is_none());
    }

    #[test]
    fn missing_timestamp_is_not_a_parse_error() {
        let line = r#"{"type":"assistant","requestId":"req_notime","message":{"model":"claude-opus-4-6","usage":{"input_tokens":100,"output_tokens":50}}}"#;
        let outcome = parse_line(line.as_bytes(), &ctx(None));
        assert!(!outcome.parse_error);
        assert_eq!(outcome.event.expect("event").date, UNKNOWN_DATE);

        let cutoff = Local.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).single();
        let outcome = parse_line(line.as_bytes(), &ctx(cutoff));
        assert!(!outcome.parse_error);
        assert!(outcome.event.is_none());
    }

    #[test]
    fn events_before_cutoff_are_dropped() {
        let cutoff = parse_timestamp("2026-02-18T10:00:01Z");
        assert!(parse_line(LINE.as_bytes(), &ctx(cutoff)).event.is_none());
        let cutoff = parse_timestamp("2026-02-18T10:00:00Z");
        assert!(parse_line(LINE.as_bytes(), &ctx(cutoff)).event.is_some());
    }

    #[test]
    fn date_uses_local_calendar_day() {
        // 23:30 at -05:00 is already the next day in UTC.
        let raw = "2026-02-18T23:30:00-05:00";
        let line = LINE.replace("2026-02-18T10:00:00Z", raw);
        let event = extract_usage_event_from_line(&line, "p").expect("event");
        let expected = DateTime::parse_from_rfc3339(raw)
            .expect("timestamp")
            .with_timezone(&Local)
            .date_naive()
            .format("%Y-%m-%d")
            .to_string();
        assert_eq!(event.date, expected);
    }

    #[test]
    fn placeholder_ids_are_unique_and_prefixed() {
        let a = placeholder_request_id("/tmp/a.jsonl", 1);
        let b = placeholder_request_id("/tmp/a.jsonl", 2);
        let c = placeholder_request_id("/tmp/b.jsonl", 1);
        assert!(a.starts_with(PLACEHOLDER_PREFIX));
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, placeholder_request_id("/tmp/a.jsonl", 1));
    }

    #[test]
    fn scan_reader_counts_errors_and_fills_missing_ids() {
        let input = format!(
            "{}\n\n{}\nnot json at all\n{}\n",
            LINE,
            r#"{"type":"assistant","timestamp":"2026-02-18T11:00:00Z","message":{"model":"claude-haiku-4-5-20251001","usage":{"input_tokens":5}}}"#,
            r#"{"type":"assistant" oops"#,
        );
        let scan = scan_reader(input.as_bytes(), "s.jsonl", &ctx(None), 1024).expect("scan");
        assert_eq!(scan.events.len(), 2);
        assert_eq!(scan.events[0].0, "req_1");
        assert!(scan.events[1].0.starts_with(PLACEHOLDER_PREFIX));
        // Only the line that passed the prefilter counts.
        assert_eq!(scan.parse_errors, 1);
    }

    #[test]
    fn overlong_line_is_a_read_error() {
        let input = format!("{}\n", LINE);
        let err = scan_reader(input.as_bytes(), "s.jsonl", &ctx(None), 64).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn line_at_limit_is_accepted() {
        let input = format!("{}\n{}", LINE, LINE.replace("req_1", "req_2"));
        let scan = scan_reader(input.as_bytes(), "s.jsonl", &ctx(None), LINE.len()).expect("scan");
        assert_eq!(scan.events.len(), 2);
    }
}
