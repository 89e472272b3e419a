//! Usage records and aggregation
//!
//! Aggregation is pure: it takes ledger records and returns totals, so
//! the report can be tested without touching the filesystem.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashMap};

/// One line of the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    /// When the call was logged
    ///
    /// Lines without a UTC offset are read as UTC.
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    /// Agent that made the call
    pub agent_name: String,
    /// Model used
    pub model: String,
    /// Prompt tokens
    pub input_tokens: u64,
    /// Completion tokens
    pub output_tokens: u64,
    /// Prompt plus completion tokens
    pub total_tokens: u64,
    /// Input cost, USD (6 decimals)
    pub input_cost: f64,
    /// Output cost, USD (6 decimals)
    pub output_cost: f64,
    /// Total cost, USD (6 decimals)
    pub total_cost: f64,
    /// First 100 characters of the prompt
    #[serde(default)]
    pub prompt_preview: String,
    /// First 100 characters of the response
    #[serde(default)]
    pub response_preview: String,
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).map_err(serde::de::Error::custom)
}

/// RFC 3339, or an ISO 8601 local timestamp taken as UTC
pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .or_else(|_| raw.parse::<NaiveDateTime>().map(|t| t.and_utc()))
}

/// Running totals for one agent or model within a session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageTotals {
    /// Number of calls
    pub calls: u64,
    /// Prompt tokens
    pub input_tokens: u64,
    /// Completion tokens
    pub output_tokens: u64,
    /// Cost, USD
    pub cost: f64,
}

impl UsageTotals {
    pub(crate) fn add(&mut self, input_tokens: u64, output_tokens: u64, cost: f64) {
        self.calls += 1;
        self.input_tokens += input_tokens;
        self.output_tokens += output_tokens;
        self.cost += cost;
    }
}

/// Usage of the current process
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Number of calls
    pub total_calls: u64,
    /// Input plus output tokens
    pub total_tokens: u64,
    /// Cost, USD rounded to 4 decimals
    pub total_cost: f64,
    /// Totals per agent
    pub by_agent: BTreeMap<String, UsageTotals>,
    /// Totals per model
    pub by_model: BTreeMap<String, UsageTotals>,
}

/// Calls, tokens and cost of one report group
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupStats {
    /// Agent name, model name or day (`YYYY-MM-DD`)
    pub key: String,
    /// Number of calls
    pub calls: u64,
    /// Total tokens
    pub tokens: u64,
    /// Total cost, USD
    pub cost: f64,
}

impl GroupStats {
    fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            calls: 0,
            tokens: 0,
            cost: 0.0,
        }
    }

    fn add(&mut self, record: &UsageRecord) {
        self.calls += 1;
        self.tokens += record.total_tokens;
        self.cost += record.total_cost;
    }
}

/// Aggregated view over the whole ledger
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LedgerSummary {
    /// Number of calls
    pub total_calls: u64,
    /// Total tokens
    pub total_tokens: u64,
    /// Total cost, USD
    pub total_cost: f64,
    /// Per agent, most expensive first
    pub by_agent: Vec<GroupStats>,
    /// Per model, most expensive first
    pub by_model: Vec<GroupStats>,
    /// Per UTC day, oldest first
    pub by_day: Vec<GroupStats>,
}

impl LedgerSummary {
    /// Whether the ledger had no calls
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total_calls == 0
    }
}

/// Groups in first-seen order, for a stable ranking among equal costs
#[derive(Default)]
struct Grouping {
    groups: Vec<GroupStats>,
    index: HashMap<String, usize>,
}

impl Grouping {
    fn add(&mut self, key: &str, record: &UsageRecord) {
        let idx = match self.index.get(key) {
            Some(&idx) => idx,
            None => {
                self.groups.push(GroupStats::new(key));
                self.index.insert(key.to_string(), self.groups.len() - 1);
                self.groups.len() - 1
            }
        };
        self.groups[idx].add(record);
    }

    fn ranked_by_cost(mut self) -> Vec<GroupStats> {
        self.groups.sort_by(|a, b| b.cost.total_cmp(&a.cost));
        self.groups
    }
}

/// Aggregate ledger records by agent, model and day
#[must_use]
pub fn aggregate(records: &[UsageRecord]) -> LedgerSummary {
    let mut by_agent = Grouping::default();
    let mut by_model = Grouping::default();
    let mut by_day: BTreeMap<String, GroupStats> = BTreeMap::new();
    let mut summary = LedgerSummary::default();

    for record in records {
        summary.total_calls += 1;
        summary.total_tokens += record.total_tokens;
        summary.total_cost += record.total_cost;

        by_agent.add(&record.agent_name, record);
        by_model.add(&record.model, record);

        let day = record.timestamp.format("%Y-%m-%d").to_string();
        by_day
            .entry(day)
            .or_insert_with_key(|day| GroupStats::new(day))
            .add(record);
    }

    summary.by_agent = by_agent.ranked_by_cost();
    summary.by_model = by_model.ranked_by_cost();
    summary.by_day = by_day.into_values().collect();
    summary
}
