//! Model Pricing - per-model USD rates
//!
//! Rates are expressed in USD per 1K tokens.

use serde::{Deserialize, Serialize};

/// Rate used for models missing from the table (input)
pub const FALLBACK_INPUT_PER_1K: f64 = 0.01;

/// Rate used for models missing from the table (output)
pub const FALLBACK_OUTPUT_PER_1K: f64 = 0.03;

/// Input and output price of one model, USD per 1K tokens
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelRate {
    /// Input (prompt) tokens
    pub input: f64,
    /// Output (completion) tokens
    pub output: f64,
}

impl ModelRate {
    /// Create a rate
    #[must_use]
    pub const fn new(input: f64, output: f64) -> Self {
        Self { input, output }
    }
}

/// A named row of the pricing table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingEntry {
    /// Model name, also used as a prefix for versioned variants
    pub model: String,
    /// Input price per 1K tokens
    pub input: f64,
    /// Output price per 1K tokens
    pub output: f64,
}

impl PricingEntry {
    fn new(model: &str, input: f64, output: f64) -> Self {
        Self {
            model: model.to_string(),
            input,
            output,
        }
    }

    /// Rate of this entry
    #[must_use]
    pub fn rate(&self) -> ModelRate {
        ModelRate::new(self.input, self.output)
    }
}

/// Ordered pricing table
///
/// Lookup tries an exact match first, then the first entry (in table
/// order) whose model name is a prefix of the requested one, then the
/// fallback rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingTable {
    /// Known models, earlier entries win prefix matches
    #[serde(default)]
    pub models: Vec<PricingEntry>,
    /// Rate for unknown models
    #[serde(default = "default_fallback")]
    pub fallback: ModelRate,
}

fn default_fallback() -> ModelRate {
    ModelRate::new(FALLBACK_INPUT_PER_1K, FALLBACK_OUTPUT_PER_1K)
}

impl Default for PricingTable {
    fn default() -> Self {
        Self {
            models: vec![
                // Anthropic
                PricingEntry::new("claude-sonnet-4-5-20250929", 0.003, 0.015),
                PricingEntry::new("claude-3-5-sonnet-20241022", 0.003, 0.015),
                PricingEntry::new("claude-3-opus-20240229", 0.015, 0.075),
                PricingEntry::new("claude-3-sonnet-20240229", 0.003, 0.015),
                PricingEntry::new("claude-3-haiku-20240307", 0.00025, 0.00125),
                // OpenAI
                PricingEntry::new("gpt-4o", 0.0025, 0.01),
                PricingEntry::new("gpt-4-turbo", 0.01, 0.03),
                PricingEntry::new("gpt-4", 0.03, 0.06),
                PricingEntry::new("gpt-3.5-turbo", 0.0005, 0.0015),
            ],
            fallback: default_fallback(),
        }
    }
}

impl PricingTable {
    /// Create a table from explicit entries
    #[must_use]
    pub fn new(models: Vec<PricingEntry>, fallback: ModelRate) -> Self {
        Self { models, fallback }
    }

    /// Rate for `model`
    #[must_use]
    pub fn get_model_costs(&self, model: &str) -> ModelRate {
        if let Some(entry) = self.models.iter().find(|e| e.model == model) {
            return entry.rate();
        }
        self.models
            .iter()
            .find(|e| model.starts_with(e.model.as_str()))
            .map_or(self.fallback, PricingEntry::rate)
    }

    /// Whether the table has an exact or prefix entry for `model`
    #[must_use]
    pub fn is_known(&self, model: &str) -> bool {
        self.models.iter().any(|e| model.starts_with(e.model.as_str()))
    }
}

/// Cost of a single call, USD
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CallCost {
    /// Cost of input tokens
    pub input_cost: f64,
    /// Cost of output tokens
    pub output_cost: f64,
    /// Sum of both
    pub total_cost: f64,
}

/// Price a call
#[must_use]
pub fn calculate_cost(input_tokens: u64, output_tokens: u64, rate: ModelRate) -> CallCost {
    let input_cost = (input_tokens as f64 / 1000.0) * rate.input;
    let output_cost = (output_tokens as f64 / 1000.0) * rate.output;
    CallCost {
        input_cost,
        output_cost,
        total_cost: input_cost + output_cost,
    }
}

/// Round a USD amount to 6 decimal places, as stored in the ledger
#[must_use]
pub fn round_cost(value: f64) -> f64 {
    round_to(value, 6)
}

/// Round a USD amount to `places` decimal places
pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
