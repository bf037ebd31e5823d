use std::collections::BTreeMap;
use std::ops::Bound;

use serde::Serialize;
use usage_core::{Bucket, PricingTable};

use crate::dedup::{CanonicalRecord, CanonicalRecords};
use crate::parser::UNKNOWN_DATE;
use crate::types::IngestIssue;

/// Branch key for records that carry no branch label.
pub const NO_BRANCH: &str = "(no branch)";

/// Aggregation dimension of a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Model,
    DateModel,
    ProjectModel,
    ProjectBranchModel,
}

impl Dimension {
    // Smallest key of the dimension; variants order before their fields.
    fn lower_bound(self) -> BucketKey {
        match self {
            Self::Model => BucketKey::Model {
                model: String::new(),
            },
            Self::DateModel => BucketKey::DateModel {
                date: String::new(),
                model: String::new(),
            },
            Self::ProjectModel => BucketKey::ProjectModel {
                project: String::new(),
                model: String::new(),
            },
            Self::ProjectBranchModel => BucketKey::ProjectBranchModel {
                project: String::new(),
                branch: String::new(),
                model: String::new(),
            },
        }
    }

    fn next(self) -> Option<Self> {
        match self {
            Self::Model => Some(Self::DateModel),
            Self::DateModel => Some(Self::ProjectModel),
            Self::ProjectModel => Some(Self::ProjectBranchModel),
            Self::ProjectBranchModel => None,
        }
    }
}

/// Composite key of one bucket: dimension tag plus its key components.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BucketKey {
    Model {
        model: String,
    },
    DateModel {
        date: String,
        model: String,
    },
    ProjectModel {
        project: String,
        model: String,
    },
    ProjectBranchModel {
        project: String,
        branch: String,
        model: String,
    },
}

impl BucketKey {
    fn for_record(record: &CanonicalRecord) -> [BucketKey; 4] {
        let branch = record
            .branch
            .clone()
            .filter(|branch| !branch.is_empty())
            .unwrap_or_else(|| NO_BRANCH.to_string());
        [
            BucketKey::Model {
                model: record.model.clone(),
            },
            BucketKey::DateModel {
                date: record.date.clone(),
                model: record.model.clone(),
            },
            BucketKey::ProjectModel {
                project: record.project.clone(),
                model: record.model.clone(),
            },
            BucketKey::ProjectBranchModel {
                project: record.project.clone(),
                branch,
                model: record.model.clone(),
            },
        ]
    }

    pub fn dimension(&self) -> Dimension {
        match self {
            Self::Model { .. } => Dimension::Model,
            Self::DateModel { .. } => Dimension::DateModel,
            Self::ProjectModel { .. } => Dimension::ProjectModel,
            Self::ProjectBranchModel { .. } => Dimension::ProjectBranchModel,
        }
    }

    pub fn model(&self) -> &str {
        match self {
            Self::Model { model }
            | Self::DateModel { model, .. }
            | Self::ProjectModel { model, .. }
            | Self::ProjectBranchModel { model, .. } => model,
        }
    }
}

/// Grand totals derived from the by-model view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct UsageTotals {
    pub cost_usd: f64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_tokens: u64,
    pub cache_write_tokens: u64,
    pub cache_write_5m_tokens: u64,
    pub cache_write_1h_tokens: u64,
    pub requests: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub from: String,
    pub to: String,
}

/// Buckets for the four views plus scan counters.
///
/// Every canonical record lands in exactly one bucket of each dimension, so
/// rolling any dimension up to models reproduces the by-model view.
#[derive(Debug, Clone, Default)]
pub struct AggregateResult {
    buckets: BTreeMap<BucketKey, Bucket>,
    pub files_walked: usize,
    pub files_skipped: usize,
    pub record_count: usize,
    pub parse_errors: usize,
    pub issues: Vec<IngestIssue>,
}

impl AggregateResult {
    /// Folds a finalized record set into buckets. Scan counters stay zero.
    pub fn from_records(records: &CanonicalRecords, pricing: &PricingTable) -> Self {
        let mut buckets: BTreeMap<BucketKey, Bucket> = BTreeMap::new();
        for (_, record) in records.iter() {
            let cost = pricing.cost(&record.model, &record.usage);
            for key in BucketKey::for_record(record) {
                buckets.entry(key).or_default().record(&record.usage, cost);
            }
        }
        Self {
            buckets,
            record_count: records.len(),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.record_count == 0
    }

    pub fn get(&self, key: &BucketKey) -> Option<&Bucket> {
        self.buckets.get(key)
    }

    pub fn model(&self, model: &str) -> Option<&Bucket> {
        self.get(&BucketKey::Model {
            model: model.to_string(),
        })
    }

    pub fn dimension(&self, dimension: Dimension) -> impl Iterator<Item = (&BucketKey, &Bucket)> {
        let upper = match dimension.next() {
            Some(next) => Bound::Excluded(next.lower_bound()),
            None => Bound::Unbounded,
        };
        self.buckets
            .range((Bound::Included(dimension.lower_bound()), upper))
    }

    pub fn by_model(&self) -> impl Iterator<Item = (&str, &Bucket)> {
        self.dimension(Dimension::Model)
            .filter_map(|(key, bucket)| match key {
                BucketKey::Model { model } => Some((model.as_str(), bucket)),
                _ => None,
            })
    }

    /// `(date, model, bucket)` in date order.
    pub fn by_date_model(&self) -> impl Iterator<Item = (&str, &str, &Bucket)> {
        self.dimension(Dimension::DateModel)
            .filter_map(|(key, bucket)| match key {
                BucketKey::DateModel { date, model } => Some((date.as_str(), model.as_str(), bucket)),
                _ => None,
            })
    }

    /// `(project, model, bucket)` in project order.
    pub fn by_project_model(&self) -> impl Iterator<Item = (&str, &str, &Bucket)> {
        self.dimension(Dimension::ProjectModel)
            .filter_map(|(key, bucket)| match key {
                BucketKey::ProjectModel { project, model } => {
                    Some((project.as_str(), model.as_str(), bucket))
                }
                _ => None,
            })
    }

    /// `(project, branch, model, bucket)` in project then branch order.
    pub fn by_project_branch_model(&self) -> impl Iterator<Item = (&str, &str, &str, &Bucket)> {
        self.dimension(Dimension::ProjectBranchModel)
            .filter_map(|(key, bucket)| match key {
                BucketKey::ProjectBranchModel {
                    project,
                    branch,
                    model,
                } => Some((project.as_str(), branch.as_str(), model.as_str(), bucket)),
                _ => None,
            })
    }

    /// Sums a dimension's buckets per model.
    pub fn model_rollup(&self, dimension: Dimension) -> BTreeMap<String, Bucket> {
        let mut rollup: BTreeMap<String, Bucket> = BTreeMap::new();
        for (key, bucket) in self.dimension(dimension) {
            rollup.entry(key.model().to_string()).or_default().merge(bucket);
        }
        rollup
    }

    /// Totals are summed from the by-model view, never tracked separately.
    pub fn totals(&self) -> UsageTotals {
        let mut sum = Bucket::default();
        for (_, bucket) in self.by_model() {
            sum.merge(bucket);
        }
        UsageTotals {
            cost_usd: sum.cost_usd,
            input_tokens: sum.input_tokens,
            output_tokens: sum.output_tokens,
            cache_read_tokens: sum.cache_read_tokens,
            cache_write_tokens: sum.total_cache_write(),
            cache_write_5m_tokens: sum.cache_write_5m_tokens,
            cache_write_1h_tokens: sum.cache_write_1h_tokens,
            requests: sum.requests,
        }
    }

    /// Earliest and latest dated bucket. Zero-padded ISO dates compare
    /// lexicographically in calendar order.
    pub fn date_range(&self) -> Option<DateRange> {
        let mut dates = self
            .by_date_model()
            .map(|(date, _, _)| date)
            .filter(|date| *date != UNKNOWN_DATE);
        let first = dates.next()?;
        let (from, to) = dates.fold((first, first), |(from, to), date| {
            (from.min(date), to.max(date))
        });
        Some(DateRange {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}
