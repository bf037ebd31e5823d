use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::time::Instant;

use ingest::{AggregateResult, DateRange, IngestIssue, ScanOptions, UsageTotals};
use serde::Serialize;
use usage_core::{Bucket, short_model_label};

use crate::error::Result;
use crate::services::{SharedConfig, SharedPricing};

#[derive(Debug, Clone, Serialize)]
pub struct ModelUsage {
    pub model: String,
    pub label: String,
    #[serde(flatten)]
    pub usage: Bucket,
}

impl ModelUsage {
    fn new(model: &str, usage: Bucket) -> Self {
        Self {
            model: model.to_string(),
            label: short_model_label(model),
            usage,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyUsage {
    pub date: String,
    pub cost_usd: f64,
    pub requests: u64,
    pub models: Vec<ModelUsage>,
}

/// Usage of one project, or of one branch within a project.
#[derive(Debug, Clone, Serialize)]
pub struct GroupUsage {
    pub project: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    pub cost_usd: f64,
    pub requests: u64,
    pub models: Vec<ModelUsage>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UsageSummary {
    pub days: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_filter: Option<String>,
    pub totals: UsageTotals,
    pub date_range: Option<DateRange>,
    /// Sorted by cost, highest first.
    pub models: Vec<ModelUsage>,
    /// Sorted by date.
    pub daily: Vec<DailyUsage>,
    /// Sorted by cost, highest first.
    pub projects: Vec<GroupUsage>,
    /// Sorted by cost, highest first.
    pub branches: Vec<GroupUsage>,
    pub files_walked: usize,
    pub files_skipped: usize,
    pub records: usize,
    pub parse_errors: usize,
    pub issues: Vec<IngestIssue>,
    pub duration_ms: u64,
}

fn by_cost_desc(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

fn sorted_models(mut models: Vec<ModelUsage>) -> Vec<ModelUsage> {
    models.sort_by(|a, b| by_cost_desc(a.usage.cost_usd, b.usage.cost_usd).then_with(|| a.model.cmp(&b.model)));
    models
}

fn sum(models: &[ModelUsage]) -> (f64, u64) {
    models.iter().fold((0.0, 0), |(cost, requests), row| {
        (cost + row.usage.cost_usd, requests + row.usage.requests)
    })
}

fn group_rows<'a, K, I>(rows: I) -> BTreeMap<K, Vec<ModelUsage>>
where
    K: Ord,
    I: Iterator<Item = (K, &'a str, &'a Bucket)>,
{
    let mut groups: BTreeMap<K, Vec<ModelUsage>> = BTreeMap::new();
    for (key, model, bucket) in rows {
        groups
            .entry(key)
            .or_default()
            .push(ModelUsage::new(model, *bucket));
    }
    groups
}

fn group_usage(project: String, branch: Option<String>, models: Vec<ModelUsage>) -> GroupUsage {
    let models = sorted_models(models);
    let (cost_usd, requests) = sum(&models);
    GroupUsage {
        project,
        branch,
        cost_usd,
        requests,
        models,
    }
}

fn sort_groups(mut groups: Vec<GroupUsage>) -> Vec<GroupUsage> {
    groups.sort_by(|a, b| {
        by_cost_desc(a.cost_usd, b.cost_usd)
            .then_with(|| a.project.cmp(&b.project))
            .then_with(|| a.branch.cmp(&b.branch))
    });
    groups
}

impl UsageSummary {
    pub fn from_result(result: AggregateResult, options: &ScanOptions, duration_ms: u64) -> Self {
        let models = sorted_models(
            result
                .by_model()
                .map(|(model, bucket)| ModelUsage::new(model, *bucket))
                .collect(),
        );

        let daily = group_rows(result.by_date_model())
            .into_iter()
            .map(|(date, models)| {
                let models = sorted_models(models);
                let (cost_usd, requests) = sum(&models);
                DailyUsage {
                    date: date.to_string(),
                    cost_usd,
                    requests,
                    models,
                }
            })
            .collect();

        let projects = sort_groups(
            group_rows(result.by_project_model())
                .into_iter()
                .map(|(project, models)| group_usage(project.to_string(), None, models))
                .collect(),
        );

        let branches = sort_groups(
            group_rows(
                result
                    .by_project_branch_model()
                    .map(|(project, branch, model, bucket)| ((project, branch), model, bucket)),
            )
            .into_iter()
            .map(|((project, branch), models)| {
                group_usage(project.to_string(), Some(branch.to_string()), models)
            })
            .collect(),
        );

        Self {
            days: options.days,
            project_filter: options.project_filter.clone(),
            totals: result.totals(),
            date_range: result.date_range(),
            models,
            daily,
            projects,
            branches,
            files_walked: result.files_walked,
            files_skipped: result.files_skipped,
            records: result.record_count,
            parse_errors: result.parse_errors,
            issues: result.issues,
            duration_ms,
        }
    }
}

#[derive(Clone)]
pub struct UsageService {
    config: SharedConfig,
    pricing: SharedPricing,
}

impl UsageService {
    pub(super) fn new(config: SharedConfig, pricing: SharedPricing) -> Self {
        Self { config, pricing }
    }

    pub fn aggregate(&self, options: &ScanOptions) -> Result<AggregateResult> {
        Ok(ingest::aggregate_usage_with_pricing(
            &self.config.base_dir,
            options,
            &self.pricing,
        )?)
    }

    pub fn summary(&self, days: u32, project: Option<&str>) -> Result<UsageSummary> {
        self.summary_with(&ScanOptions::new(days, project.map(str::to_string)))
    }

    pub fn summary_with(&self, options: &ScanOptions) -> Result<UsageSummary> {
        let started = Instant::now();
        let result = self.aggregate(options)?;
        let duration_ms = started.elapsed().as_millis() as u64;
        Ok(UsageSummary::from_result(result, options, duration_ms))
    }
}
