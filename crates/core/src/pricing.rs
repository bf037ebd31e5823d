use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::TokenUsage;

pub const CACHE_WRITE_5M_MULTIPLIER: f64 = 1.25;
pub const CACHE_WRITE_1H_MULTIPLIER: f64 = 2.0;
pub const CACHE_READ_MULTIPLIER: f64 = 0.1;

const TOKENS_PER_UNIT: f64 = 1_000_000.0;

// USD per million tokens.
const BUILTIN_MODELS: &[(&str, f64, f64)] = &[
    ("claude-opus-4-6", 5.00, 25.00),
    ("claude-opus-4-5-20251101", 5.00, 25.00),
    ("claude-opus-4-1-20250414", 15.00, 75.00),
    ("claude-sonnet-4-6", 3.00, 15.00),
    ("claude-sonnet-4-5-20250929", 3.00, 15.00),
    ("claude-sonnet-4-20250514", 3.00, 15.00),
    ("claude-haiku-4-5-20251001", 1.00, 5.00),
    ("claude-haiku-3-5-20241022", 0.80, 4.00),
];

const BUILTIN_PREFIXES: &[(&str, &str)] = &[
    ("claude-opus-4-6", "claude-opus-4-6"),
    ("claude-opus-4-5", "claude-opus-4-5-20251101"),
    ("claude-opus-4-1", "claude-opus-4-1-20250414"),
    ("claude-opus-4", "claude-opus-4-1-20250414"),
    ("claude-sonnet-4-6", "claude-sonnet-4-6"),
    ("claude-sonnet-4-5", "claude-sonnet-4-5-20250929"),
    ("claude-sonnet-4", "claude-sonnet-4-20250514"),
    ("claude-sonnet-3", "claude-sonnet-4-5-20250929"),
    ("claude-haiku-4-5", "claude-haiku-4-5-20251001"),
    ("claude-haiku-3-5", "claude-haiku-3-5-20241022"),
    ("claude-haiku-3", "claude-haiku-3-5-20241022"),
];

// Same card as claude-sonnet-4-6.
const BUILTIN_FALLBACK: RateCard = RateCard::new(3.00, 15.00);

static BUILTIN: LazyLock<PricingTable> = LazyLock::new(PricingTable::builtin_table);

/// Base per-model rates. Cache tier rates are fixed multiples of the input rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateCard {
    pub input_per_1m: f64,
    pub output_per_1m: f64,
}

impl RateCard {
    pub const fn new(input_per_1m: f64, output_per_1m: f64) -> Self {
        Self {
            input_per_1m,
            output_per_1m,
        }
    }

    pub fn cache_write_5m_per_1m(&self) -> f64 {
        self.input_per_1m * CACHE_WRITE_5M_MULTIPLIER
    }

    pub fn cache_write_1h_per_1m(&self) -> f64 {
        self.input_per_1m * CACHE_WRITE_1H_MULTIPLIER
    }

    pub fn cache_read_per_1m(&self) -> f64 {
        self.input_per_1m * CACHE_READ_MULTIPLIER
    }
}

/// Maps every model id starting with `prefix` onto the card of `model`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyPrefix {
    pub prefix: String,
    pub model: String,
}

/// Serializable form of a pricing table, as stored in a pricing override file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingTableInput {
    pub models: BTreeMap<String, RateCard>,
    #[serde(default)]
    pub prefixes: Vec<FamilyPrefix>,
    pub fallback: RateCard,
}

#[derive(Debug, Error, PartialEq)]
pub enum PricingError {
    #[error("prefix {prefix:?} points at unknown model {model:?}")]
    UnknownPrefixTarget { prefix: String, model: String },
    #[error("prefix must not be empty")]
    EmptyPrefix,
}

/// Resolves model ids to rate cards: exact match, then longest family prefix,
/// then the global fallback.
#[derive(Debug, Clone)]
pub struct PricingTable {
    models: HashMap<String, RateCard>,
    // Longest prefix first; equal lengths ordered lexicographically.
    prefixes: Vec<(String, RateCard)>,
    fallback: RateCard,
}

impl PricingTable {
    pub fn from_input(input: PricingTableInput) -> Result<Self, PricingError> {
        let mut prefixes = Vec::with_capacity(input.prefixes.len());
        for family in input.prefixes {
            if family.prefix.is_empty() {
                return Err(PricingError::EmptyPrefix);
            }
            let Some(card) = input.models.get(&family.model).copied() else {
                return Err(PricingError::UnknownPrefixTarget {
                    prefix: family.prefix,
                    model: family.model,
                });
            };
            prefixes.push((family.prefix, card));
        }
        Ok(Self::assemble(
            input.models.into_iter().collect(),
            prefixes,
            input.fallback,
        ))
    }

    /// The table compiled into the binary.
    pub fn builtin() -> &'static PricingTable {
        &BUILTIN
    }

    /// The compiled-in table in its serializable form.
    pub fn builtin_input() -> PricingTableInput {
        PricingTableInput {
            models: BUILTIN_MODELS
                .iter()
                .map(|(model, input, output)| (model.to_string(), RateCard::new(*input, *output)))
                .collect(),
            prefixes: BUILTIN_PREFIXES
                .iter()
                .map(|(prefix, model)| FamilyPrefix {
                    prefix: prefix.to_string(),
                    model: model.to_string(),
                })
                .collect(),
            fallback: BUILTIN_FALLBACK,
        }
    }

    fn builtin_table() -> Self {
        let models: HashMap<String, RateCard> = BUILTIN_MODELS
            .iter()
            .map(|(model, input, output)| (model.to_string(), RateCard::new(*input, *output)))
            .collect();
        let prefixes = BUILTIN_PREFIXES
            .iter()
            .filter_map(|(prefix, model)| {
                models
                    .get(*model)
                    .map(|card| (prefix.to_string(), *card))
            })
            .collect();
        Self::assemble(models, prefixes, BUILTIN_FALLBACK)
    }

    fn assemble(
        models: HashMap<String, RateCard>,
        mut prefixes: Vec<(String, RateCard)>,
        fallback: RateCard,
    ) -> Self {
        prefixes.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
        Self {
            models,
            prefixes,
            fallback,
        }
    }

    pub fn resolve(&self, model: &str) -> RateCard {
        if let Some(card) = self.models.get(model) {
            return *card;
        }
        self.prefixes
            .iter()
            .find(|(prefix, _)| model.starts_with(prefix.as_str()))
            .map(|(_, card)| *card)
            .unwrap_or(self.fallback)
    }

    pub fn fallback(&self) -> RateCard {
        self.fallback
    }

    pub fn cost(&self, model: &str, usage: &TokenUsage) -> f64 {
        compute_cost_breakdown(usage, &self.resolve(model)).total_cost_usd
    }
}

impl Default for PricingTable {
    fn default() -> Self {
        BUILTIN.clone()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub input_cost_usd: f64,
    pub output_cost_usd: f64,
    pub cache_write_5m_cost_usd: f64,
    pub cache_write_1h_cost_usd: f64,
    pub cache_read_cost_usd: f64,
    pub total_cost_usd: f64,
}

/// Cost of `usage` under the builtin pricing table.
pub fn compute_cost(model: &str, usage: &TokenUsage) -> f64 {
    PricingTable::builtin().cost(model, usage)
}

pub fn compute_cost_breakdown(usage: &TokenUsage, card: &RateCard) -> CostBreakdown {
    let cache = usage.cache_write();
    let input_cost = (usage.input_tokens as f64 / TOKENS_PER_UNIT) * card.input_per_1m;
    let output_cost = (usage.output_tokens as f64 / TOKENS_PER_UNIT) * card.output_per_1m;
    let cache_write_5m_cost =
        (cache.five_minute as f64 / TOKENS_PER_UNIT) * card.cache_write_5m_per_1m();
    let cache_write_1h_cost =
        (cache.one_hour as f64 / TOKENS_PER_UNIT) * card.cache_write_1h_per_1m();
    let cache_read_cost =
        (usage.cache_read_input_tokens as f64 / TOKENS_PER_UNIT) * card.cache_read_per_1m();
    CostBreakdown {
        input_cost_usd: input_cost,
        output_cost_usd: output_cost,
        cache_write_5m_cost_usd: cache_write_5m_cost,
        cache_write_1h_cost_usd: cache_write_1h_cost,
        cache_read_cost_usd: cache_read_cost,
        total_cost_usd: input_cost
            + output_cost
            + cache_write_5m_cost
            + cache_write_1h_cost
            + cache_read_cost,
    }
}
