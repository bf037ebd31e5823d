use std::fmt::Write as _;

use usage_app::{GroupUsage, ModelUsage, StatusSnapshot, UsageSummary};

const RULE_WIDTH: usize = 79;

/// Which optional sections to print.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportOptions {
    pub daily: bool,
    pub projects: bool,
    pub branches: bool,
    /// Row limit per section; 0 keeps every row.
    pub top: usize,
}

pub fn fmt_tokens(n: u64) -> String {
    let value = n as f64;
    match n {
        1_000_000_000.. => format!("{:.1}B", value / 1_000_000_000.0),
        1_000_000.. => format!("{:.1}M", value / 1_000_000.0),
        1_000.. => format!("{:.1}K", value / 1_000.0),
        _ => n.to_string(),
    }
}

pub fn fmt_cost(cost: f64) -> String {
    if cost >= 1.0 {
        format!("${:.2}", cost)
    } else {
        format!("${:.4}", cost)
    }
}

/// Readable name for a project directory slug such as `-home-me-src-web`.
pub fn short_project(slug: &str) -> String {
    let mut name = slug;
    for prefix in ["-Users-", "-home-"] {
        if let Some(idx) = name.find(prefix) {
            let rest = &name[idx + prefix.len()..];
            if let Some(user_end) = rest.find('-') {
                name = &rest[user_end + 1..];
            }
        }
    }
    let mut name = name.to_string();
    while name.contains("--") {
        name = name.replace("--", "-");
    }
    let mut name = name.trim_matches('-').replacen('-', "/", 1);
    if name.is_empty() {
        name = slug.to_string();
    }
    let chars: Vec<char> = name.chars().collect();
    if chars.len() > 40 {
        let tail: String = chars[chars.len() - 37..].iter().collect();
        name = format!("...{}", tail);
    }
    name
}

fn limit<T>(rows: &[T], top: usize) -> &[T] {
    if top == 0 || rows.len() <= top {
        rows
    } else {
        &rows[..top]
    }
}

fn rule(out: &mut String, ch: char) {
    let _ = writeln!(out, "{}", ch.to_string().repeat(RULE_WIDTH));
}

fn section(out: &mut String, title: &str) {
    rule(out, '-');
    let _ = writeln!(out, "  {}", title);
    rule(out, '-');
}

fn model_line(out: &mut String, row: &ModelUsage) {
    let _ = writeln!(
        out,
        "  {:<16} {:>9} {:>9} {:>9} {:>9} {:>7} {:>10}",
        row.label,
        fmt_tokens(row.usage.input_tokens),
        fmt_tokens(row.usage.output_tokens),
        fmt_tokens(row.usage.cache_read_tokens),
        fmt_tokens(row.usage.total_cache_write()),
        row.usage.requests,
        fmt_cost(row.usage.cost_usd)
    );
}

fn group_lines(out: &mut String, name: &str, group: &GroupUsage) {
    let mut first = true;
    for row in &group.models {
        let label = if first { name } else { "" };
        let _ = writeln!(
            out,
            "  {:<35} {:<16} {:>7} {:>10}",
            label,
            row.label,
            row.usage.requests,
            fmt_cost(row.usage.cost_usd)
        );
        first = false;
    }
    let _ = writeln!(
        out,
        "  {:<35} {:<16} {:>7} {:>10}",
        "",
        "",
        group.requests,
        fmt_cost(group.cost_usd)
    );
}

pub fn render_summary(summary: &UsageSummary, options: ReportOptions) -> String {
    let mut out = String::new();
    rule(&mut out, '=');
    let _ = writeln!(out, "  Usage Report");
    rule(&mut out, '=');
    let _ = writeln!(
        out,
        "  Parsed {} log files, {} API calls ({}ms)",
        summary.files_walked, summary.records, summary.duration_ms
    );
    if let Some(range) = &summary.date_range {
        if range.from == range.to {
            let _ = writeln!(out, "  Date: {}", range.from);
        } else {
            let _ = writeln!(out, "  Period: {} to {}", range.from, range.to);
        }
    }
    if summary.parse_errors > 0 {
        let _ = writeln!(out, "  ({} parse errors skipped)", summary.parse_errors);
    }
    if !summary.issues.is_empty() {
        let _ = writeln!(out, "  ({} unreadable files skipped)", summary.issues.len());
    }
    out.push('\n');

    section(&mut out, "MODEL BREAKDOWN");
    let _ = writeln!(
        out,
        "  {:<16} {:>9} {:>9} {:>9} {:>9} {:>7} {:>10}",
        "Model", "Input", "Output", "Cache R", "Cache W", "Reqs", "Cost"
    );
    for row in &summary.models {
        model_line(&mut out, row);
    }
    let totals = &summary.totals;
    let _ = writeln!(
        out,
        "  {:<16} {:>9} {:>9} {:>9} {:>9} {:>7} {:>10}",
        "TOTAL",
        fmt_tokens(totals.input_tokens),
        fmt_tokens(totals.output_tokens),
        fmt_tokens(totals.cache_read_tokens),
        fmt_tokens(totals.cache_write_tokens),
        totals.requests,
        fmt_cost(totals.cost_usd)
    );
    out.push('\n');

    if options.daily {
        section(&mut out, "DAILY BREAKDOWN");
        // Newest first.
        let days: Vec<_> = summary.daily.iter().rev().cloned().collect();
        for day in limit(&days, options.top) {
            let mut first = true;
            for row in &day.models {
                let date = if first { day.date.as_str() } else { "" };
                let _ = writeln!(
                    out,
                    "  {:<12} {:<16} {:>9} {:>9} {:>7} {:>10}",
                    date,
                    row.label,
                    fmt_tokens(row.usage.input_tokens),
                    fmt_tokens(row.usage.output_tokens),
                    row.usage.requests,
                    fmt_cost(row.usage.cost_usd)
                );
                first = false;
            }
            let _ = writeln!(
                out,
                "  {:<12} {:<16} {:>9} {:>9} {:>7} {:>10}",
                "",
                "",
                "",
                "",
                day.requests,
                fmt_cost(day.cost_usd)
            );
        }
        out.push('\n');
    }

    if options.projects {
        section(&mut out, "PROJECT BREAKDOWN");
        for group in limit(&summary.projects, options.top) {
            group_lines(&mut out, &short_project(&group.project), group);
        }
        out.push('\n');
    }

    if options.branches {
        section(&mut out, "BRANCH BREAKDOWN");
        for group in limit(&summary.branches, options.top) {
            let name = format!(
                "{} @ {}",
                short_project(&group.project),
                group.branch.as_deref().unwrap_or(ingest::NO_BRANCH)
            );
            group_lines(&mut out, &name, group);
        }
        out.push('\n');
    }
    out
}

pub fn render_status(snapshot: &StatusSnapshot) -> String {
    let mut parts = vec![format!("{} session", fmt_cost(snapshot.session_cost_usd))];
    if snapshot.today_cost_usd > 0.0 {
        parts.push(format!("{} today", fmt_cost(snapshot.today_cost_usd)));
    }
    parts.push(format!("{:.0}% ctx", snapshot.context_used_percent));
    if !snapshot.model_label.is_empty() {
        parts.push(snapshot.model_label.clone());
    }
    parts.join(" · ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use usage_app::CostSource;

    #[test]
    fn formats_token_counts() {
        assert_eq!(fmt_tokens(999), "999");
        assert_eq!(fmt_tokens(1_500), "1.5K");
        assert_eq!(fmt_tokens(2_340_000), "2.3M");
        assert_eq!(fmt_tokens(1_000_000_000), "1.0B");
    }

    #[test]
    fn formats_costs() {
        assert_eq!(fmt_cost(30.0), "$30.00");
        assert_eq!(fmt_cost(0.0123), "$0.0123");
    }

    #[test]
    fn shortens_project_slugs() {
        assert_eq!(short_project("-home-me-src-web"), "src/web");
        assert_eq!(short_project("-Users-alice-code--api"), "code/api");
        assert_eq!(short_project("plain"), "plain");
        assert_eq!(short_project("---"), "---");
        let long = format!("-home-me-{}", "x".repeat(60));
        let short = short_project(&long);
        assert!(short.starts_with("..."));
        assert_eq!(short.chars().count(), 40);
    }

    #[test]
    fn limits_rows() {
        let rows = [1, 2, 3];
        assert_eq!(limit(&rows, 0).len(), 3);
        assert_eq!(limit(&rows, 2).len(), 2);
        assert_eq!(limit(&rows, 9).len(), 3);
    }

    #[test]
    fn status_line_omits_zero_today() {
        let mut snapshot = StatusSnapshot {
            session_cost_usd: 1.5,
            session_cost_source: CostSource::Transcript,
            today_cost_usd: 0.0,
            context_used_percent: 42.4,
            model_label: "Opus 4.6".to_string(),
        };
        assert_eq!(render_status(&snapshot), "$1.50 session · 42% ctx · Opus 4.6");
        snapshot.today_cost_usd = 12.0;
        assert_eq!(
            render_status(&snapshot),
            "$1.50 session · $12.00 today · 42% ctx · Opus 4.6"
        );
    }
}
