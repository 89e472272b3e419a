//! Usage Ledger - append-only JSONL log of priced LLM calls

use super::pricing::{calculate_cost, round_cost, round_to, PricingTable};
use super::record::{aggregate, SessionSummary, UsageRecord, UsageTotals};
use super::report::{format_report, NO_CALLS_MESSAGE};
use crate::error::{Error, Result};
use chrono::Utc;
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info, instrument};

/// Characters kept from prompts and responses
pub const PREVIEW_CHARS: usize = 100;

#[derive(Debug, Default)]
struct SessionStats {
    total_calls: u64,
    input_tokens: u64,
    output_tokens: u64,
    total_cost: f64,
    by_agent: BTreeMap<String, UsageTotals>,
    by_model: BTreeMap<String, UsageTotals>,
}

impl SessionStats {
    fn add(&mut self, agent_name: &str, model: &str, input: u64, output: u64, cost: f64) {
        self.total_calls += 1;
        self.input_tokens += input;
        self.output_tokens += output;
        self.total_cost += cost;
        self.by_agent
            .entry(agent_name.to_string())
            .or_default()
            .add(input, output, cost);
        self.by_model
            .entry(model.to_string())
            .or_default()
            .add(input, output, cost);
    }

    fn summary(&self) -> SessionSummary {
        SessionSummary {
            total_calls: self.total_calls,
            total_tokens: self.input_tokens + self.output_tokens,
            total_cost: round_to(self.total_cost, 4),
            by_agent: self.by_agent.clone(),
            by_model: self.by_model.clone(),
        }
    }
}

/// Persistent ledger of LLM calls plus totals for the current process
#[derive(Debug)]
pub struct UsageLedger {
    path: PathBuf,
    pricing: PricingTable,
    session: Mutex<SessionStats>,
}

impl UsageLedger {
    /// Open a ledger at `path`, creating its parent directory
    pub fn new(path: impl Into<PathBuf>, pricing: PricingTable) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self {
            path,
            pricing,
            session: Mutex::new(SessionStats::default()),
        })
    }

    /// Ledger file location
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Pricing table used for new entries
    #[must_use]
    pub fn pricing(&self) -> &PricingTable {
        &self.pricing
    }

    /// Price a call, append it to the ledger and update session totals
    ///
    /// The line is written with a single `write_all` and synced before the
    /// session totals change, so a crash never leaves a counted call
    /// missing from the file.
    #[instrument(skip(self, prompt_preview, response_preview))]
    pub fn log_call(
        &self,
        agent_name: &str,
        model: &str,
        input_tokens: u64,
        output_tokens: u64,
        prompt_preview: &str,
        response_preview: &str,
    ) -> Result<UsageRecord> {
        let cost = calculate_cost(
            input_tokens,
            output_tokens,
            self.pricing.get_model_costs(model),
        );

        let record = UsageRecord {
            timestamp: Utc::now(),
            agent_name: agent_name.to_string(),
            model: model.to_string(),
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
            input_cost: round_cost(cost.input_cost),
            output_cost: round_cost(cost.output_cost),
            total_cost: round_cost(cost.total_cost),
            prompt_preview: preview(prompt_preview),
            response_preview: preview(response_preview),
        };

        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        // Holding the session lock serializes appends from concurrent callers.
        let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        file.sync_data()?;

        session.add(agent_name, model, input_tokens, output_tokens, cost.total_cost);

        debug!(
            "LLM call logged: {agent_name} used {model} - ${:.6}",
            cost.total_cost
        );
        Ok(record)
    }

    /// Totals accumulated by this process
    #[must_use]
    pub fn session_summary(&self) -> SessionSummary {
        self.session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .summary()
    }

    /// Read every entry in the ledger
    ///
    /// A missing file reads as empty. Blank lines are skipped; any other
    /// line that does not parse is an error.
    pub fn read_entries(&self) -> Result<Vec<UsageRecord>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(idx, line)| {
                serde_json::from_str(line).map_err(|e| Error::LedgerParse {
                    line: idx + 1,
                    message: e.to_string(),
                })
            })
            .collect()
    }

    /// Build the cost report from the full ledger
    ///
    /// When `output_file` is given the report is also written there.
    /// An empty ledger yields [`NO_CALLS_MESSAGE`] and writes nothing.
    pub fn generate_cost_report(&self, output_file: Option<&Path>) -> Result<String> {
        let entries = self.read_entries()?;
        if entries.is_empty() {
            return Ok(NO_CALLS_MESSAGE.to_string());
        }

        let report = format_report(&aggregate(&entries));

        if let Some(output_file) = output_file {
            if let Some(parent) = output_file.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(output_file, &report)?;
            info!("Cost report written to {}", output_file.display());
        }

        Ok(report)
    }
}

fn preview(text: &str) -> String {
    text.chars().take(PREVIEW_CHARS).collect()
}
