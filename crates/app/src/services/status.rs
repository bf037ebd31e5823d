use std::path::PathBuf;
use std::thread;

use ingest::ScanOptions;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use usage_core::{null_as_default, short_model_label};

use crate::services::{SharedConfig, SharedPricing};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusModel {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub display_name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusCost {
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_cost_usd: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusContextWindow {
    #[serde(default, deserialize_with = "null_as_default")]
    pub used_percentage: f64,
}

/// Session document handed to the status line on stdin.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusInput {
    #[serde(default, deserialize_with = "null_as_default")]
    pub model: StatusModel,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cost: StatusCost,
    #[serde(default, deserialize_with = "null_as_default")]
    pub context_window: StatusContextWindow,
    #[serde(default)]
    pub transcript_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CostSource {
    Transcript,
    Reported,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub session_cost_usd: f64,
    pub session_cost_source: CostSource,
    pub today_cost_usd: f64,
    pub context_used_percent: f64,
    pub model_label: String,
}

#[derive(Clone)]
pub struct StatusService {
    config: SharedConfig,
    pricing: SharedPricing,
}

impl StatusService {
    pub(super) fn new(config: SharedConfig, pricing: SharedPricing) -> Self {
        Self { config, pricing }
    }

    /// Cost of the session's transcript and delegates. Falls back to the
    /// reported cost when there is no transcript or it cannot be read.
    pub fn session_cost(&self, input: &StatusInput) -> (f64, CostSource) {
        let reported = (input.cost.total_cost_usd, CostSource::Reported);
        let Some(path) = input
            .transcript_path
            .as_deref()
            .filter(|path| !path.as_os_str().is_empty())
        else {
            return reported;
        };
        match ingest::session_records(path) {
            Ok(records) => (
                ingest::session_cost(&records, &self.pricing),
                CostSource::Transcript,
            ),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "using reported session cost");
                reported
            }
        }
    }

    /// Cost of every session since local midnight; zero when the scan fails.
    pub fn today_cost(&self) -> f64 {
        let options = ScanOptions::new(1, None);
        match ingest::aggregate_usage_with_pricing(&self.config.base_dir, &options, &self.pricing) {
            Ok(result) => result.totals().cost_usd,
            Err(err) => {
                debug!(error = %err, "today's cost unavailable");
                0.0
            }
        }
    }

    /// Runs the session and today passes on two scoped threads.
    pub fn snapshot(&self, input: &StatusInput) -> StatusSnapshot {
        let (session, today) = thread::scope(|scope| {
            let session = scope.spawn(|| self.session_cost(input));
            let today = scope.spawn(|| self.today_cost());
            (session.join(), today.join())
        });
        let (session_cost_usd, session_cost_source) =
            session.unwrap_or((input.cost.total_cost_usd, CostSource::Reported));
        let label_source = if input.model.id.is_empty() {
            &input.model.display_name
        } else {
            &input.model.id
        };
        StatusSnapshot {
            session_cost_usd,
            session_cost_source,
            today_cost_usd: today.unwrap_or(0.0),
            context_used_percent: input.context_window.used_percentage,
            model_label: short_model_label(label_source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_fields_default_when_absent() {
        let input: StatusInput = serde_json::from_str("{}").expect("input");
        assert!(input.model.id.is_empty());
        assert!(input.transcript_path.is_none());
        assert_eq!(input.cost.total_cost_usd, 0.0);
    }

    #[test]
    fn input_accepts_null_everywhere() {
        let raw = r#"{
            "model": {"id": null, "display_name": null},
            "cost": {"total_cost_usd": null},
            "context_window": {"used_percentage": null},
            "transcript_path": null
        }"#;
        let input: StatusInput = serde_json::from_str(raw).expect("input");
        assert!(input.model.id.is_empty());
        assert!(input.model.display_name.is_empty());
        assert_eq!(input.cost.total_cost_usd, 0.0);
        assert_eq!(input.context_window.used_percentage, 0.0);
        assert!(input.transcript_path.is_none());

        let raw = r#"{"model": null, "cost": null, "context_window": null}"#;
        let input: StatusInput = serde_json::from_str(raw).expect("input");
        assert!(input.model.id.is_empty());
        assert_eq!(input.context_window.used_percentage, 0.0);
    }

    #[test]
    fn input_reads_nested_fields() {
        let raw = r#"{
            "model": {"id": "claude-opus-4-6", "display_name": "Opus"},
            "cost": {"total_cost_usd": 1.25},
            "context_window": {"used_percentage": 42.5},
            "transcript_path": "/tmp/p/abc.jsonl",
            "workspace": {"current_dir": "/tmp"}
        }"#;
        let input: StatusInput = serde_json::from_str(raw).expect("input");
        assert_eq!(input.model.display_name, "Opus");
        assert_eq!(input.cost.total_cost_usd, 1.25);
        assert_eq!(input.context_window.used_percentage, 42.5);
        assert_eq!(
            input.transcript_path.as_deref(),
            Some(std::path::Path::new("/tmp/p/abc.jsonl"))
        );
    }
}
