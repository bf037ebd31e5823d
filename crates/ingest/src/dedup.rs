use std::collections::BTreeMap;

use serde::Serialize;
use usage_core::{PricingTable, TokenUsage};

/// Final state of one request after deduplication.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalRecord {
    pub model: String,
    pub date: String,
    pub project: String,
    pub branch: Option<String>,
    pub usage: TokenUsage,
}

/// Canonical records keyed by request id.
///
/// Streaming writes the same request id several times with growing usage.
/// Events carry no sequence number, so merging is positional: the last insert
/// replaces the whole record. Callers must insert in emission order (files in
/// walk order, lines in file order); the store cannot check this itself.
///
/// Iteration is ordered by request id so repeated runs fold records in the
/// same order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanonicalRecords {
    records: BTreeMap<String, CanonicalRecord>,
}

impl CanonicalRecords {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `record` as the canonical state of `request_id`, returning the
    /// record it replaced.
    pub fn insert(&mut self, request_id: String, record: CanonicalRecord) -> Option<CanonicalRecord> {
        self.records.insert(request_id, record)
    }

    /// Merges a batch of events, in order.
    pub fn extend<I>(&mut self, events: I)
    where
        I: IntoIterator<Item = (String, CanonicalRecord)>,
    {
        for (request_id, record) in events {
            self.insert(request_id, record);
        }
    }

    pub fn get(&self, request_id: &str) -> Option<&CanonicalRecord> {
        self.records.get(request_id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CanonicalRecord)> {
        self.records
            .iter()
            .map(|(request_id, record)| (request_id.as_str(), record))
    }

    pub fn total_cost(&self, pricing: &PricingTable) -> f64 {
        self.records
            .values()
            .map(|record| pricing.cost(&record.model, &record.usage))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(model: &str, project: &str, output: u64) -> CanonicalRecord {
        CanonicalRecord {
            model: model.to_string(),
            date: "2026-02-18".to_string(),
            project: project.to_string(),
            branch: None,
            usage: TokenUsage {
                input_tokens: 100,
                output_tokens: output,
                ..TokenUsage::default()
            },
        }
    }

    #[test]
    fn last_write_wins() {
        let mut records = CanonicalRecords::new();
        for output in [10, 25, 40, 55] {
            records.insert("req_1".to_string(), record("claude-opus-4-6", "a", output));
        }
        assert_eq!(records.len(), 1);
        assert_eq!(records.get("req_1").expect("record").usage.output_tokens, 55);
    }

    #[test]
    fn replacement_is_whole_record() {
        let mut records = CanonicalRecords::new();
        let mut first = record("claude-opus-4-6", "a", 10);
        first.branch = Some("main".to_string());
        first.usage.cache_read_input_tokens = 500;
        records.insert("req_1".to_string(), first);
        let previous = records.insert("req_1".to_string(), record("claude-haiku-3-5-20241022", "b", 20));
        assert_eq!(previous.expect("previous").branch.as_deref(), Some("main"));

        let current = records.get("req_1").expect("record");
        assert_eq!(current.model, "claude-haiku-3-5-20241022");
        assert_eq!(current.project, "b");
        assert_eq!(current.branch, None);
        assert_eq!(current.usage.cache_read_input_tokens, 0);
    }

    #[test]
    fn same_id_across_projects_collapses() {
        let mut records = CanonicalRecords::new();
        records.extend([
            ("req_shared".to_string(), record("claude-opus-4-6", "alpha", 10)),
            ("req_shared".to_string(), record("claude-opus-4-6", "beta", 20)),
            ("req_other".to_string(), record("claude-opus-4-6", "alpha", 30)),
        ]);
        assert_eq!(records.len(), 2);
        assert_eq!(records.get("req_shared").expect("record").project, "beta");
    }

    #[test]
    fn iteration_is_ordered_by_request_id() {
        let mut records = CanonicalRecords::new();
        for id in ["req_c", "req_a", "req_b"] {
            records.insert(id.to_string(), record("claude-opus-4-6", "a", 1));
        }
        let ids: Vec<&str> = records.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["req_a", "req_b", "req_c"]);
    }

    #[test]
    fn total_cost_sums_each_record_once() {
        let mut records = CanonicalRecords::new();
        let mut usage = record("claude-opus-4-6", "a", 1_000_000);
        usage.usage.input_tokens = 1_000_000;
        records.insert("req_1".to_string(), usage.clone());
        records.insert("req_1".to_string(), usage.clone());
        records.insert("req_2".to_string(), usage);
        let cost = records.total_cost(PricingTable::builtin());
        assert!((cost - 60.0).abs() < 1e-9);
    }
}
