mod labels;
mod pricing;

use serde::{Deserialize, Deserializer, Serialize};

pub use labels::short_model_label;
pub use pricing::{
    CACHE_READ_MULTIPLIER, CACHE_WRITE_1H_MULTIPLIER, CACHE_WRITE_5M_MULTIPLIER, CostBreakdown,
    FamilyPrefix, PricingError, PricingTable, PricingTableInput, RateCard, compute_cost,
    compute_cost_breakdown,
};

/// Deserializes an explicit `null` as the type's default, the same as an
/// absent field under `#[serde(default)]`.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Per-tier cache creation counts reported by newer log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheCreation {
    #[serde(default, deserialize_with = "null_as_default")]
    pub ephemeral_5m_input_tokens: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ephemeral_1h_input_tokens: u64,
}

/// Token usage payload of one assistant message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default, deserialize_with = "null_as_default")]
    pub input_tokens: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub output_tokens: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cache_read_input_tokens: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cache_creation_input_tokens: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_creation: Option<CacheCreation>,
}

/// Cache write tokens split by tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheWrite {
    pub five_minute: u64,
    pub one_hour: u64,
}

impl TokenUsage {
    /// Resolves cache write tokens into tiers.
    ///
    /// The nested breakdown wins when it carries any tokens. Otherwise the flat
    /// `cache_creation_input_tokens` count is billed entirely at the 5 minute
    /// tier; a 1 hour share is never inferred from it.
    pub fn cache_write(&self) -> CacheWrite {
        let mut write = self
            .cache_creation
            .map(|tiers| CacheWrite {
                five_minute: tiers.ephemeral_5m_input_tokens,
                one_hour: tiers.ephemeral_1h_input_tokens,
            })
            .unwrap_or_default();
        if write.five_minute == 0 && write.one_hour == 0 && self.cache_creation_input_tokens > 0 {
            write.five_minute = self.cache_creation_input_tokens;
        }
        write
    }
}

/// Running token/cost/request totals for one aggregation key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_tokens: u64,
    pub cache_write_5m_tokens: u64,
    pub cache_write_1h_tokens: u64,
    pub cost_usd: f64,
    pub requests: u64,
}

impl Bucket {
    /// Folds one canonical record into the bucket.
    pub fn record(&mut self, usage: &TokenUsage, cost_usd: f64) {
        let cache = usage.cache_write();
        self.input_tokens = self.input_tokens.saturating_add(usage.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(usage.output_tokens);
        self.cache_read_tokens = self
            .cache_read_tokens
            .saturating_add(usage.cache_read_input_tokens);
        self.cache_write_5m_tokens = self.cache_write_5m_tokens.saturating_add(cache.five_minute);
        self.cache_write_1h_tokens = self.cache_write_1h_tokens.saturating_add(cache.one_hour);
        self.cost_usd += cost_usd;
        self.requests = self.requests.saturating_add(1);
    }

    /// Adds another bucket's totals into this one.
    pub fn merge(&mut self, other: &Bucket) {
        self.input_tokens = self.input_tokens.saturating_add(other.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(other.output_tokens);
        self.cache_read_tokens = self.cache_read_tokens.saturating_add(other.cache_read_tokens);
        self.cache_write_5m_tokens = self
            .cache_write_5m_tokens
            .saturating_add(other.cache_write_5m_tokens);
        self.cache_write_1h_tokens = self
            .cache_write_1h_tokens
            .saturating_add(other.cache_write_1h_tokens);
        self.cost_usd += other.cost_usd;
        self.requests = self.requests.saturating_add(other.requests);
    }

    pub fn total_cache_write(&self) -> u64 {
        self.cache_write_5m_tokens
            .saturating_add(self.cache_write_1h_tokens)
    }
}
