//! Application configuration types

use anyhow::{anyhow, bail, Result};
use mastery_core::{default_catalog, PhaseSpec, RunnerSettings};
use mastery_llm::{default_providers, PricingTable, ProviderConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub state_db_path: PathBuf,
    pub ledger_path: PathBuf,
    pub artifacts_dir: PathBuf,
    pub logs_dir: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_model")]
    pub default_model: String,
    #[serde(default = "default_task_delay_secs")]
    pub task_delay_secs: f64,
    #[serde(default)]
    pub skip_existing_artifacts: bool,
    pub executor: ExecutorConfig,
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderConfig>,
    #[serde(default)]
    pub pricing: PricingTable,
    #[serde(default)]
    pub phases: Vec<PhaseSpec>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_model() -> String {
    "claude-sonnet-4-5-20250929".to_string()
}

fn default_task_delay_secs() -> f64 {
    2.0
}

/// Command that runs a crew
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            state_db_path: PathBuf::from("data/state.db"),
            ledger_path: PathBuf::from("logs/llm_calls.jsonl"),
            artifacts_dir: PathBuf::from("artifacts"),
            logs_dir: PathBuf::from("logs"),
            log_level: default_log_level(),
            default_model: default_model(),
            task_delay_secs: default_task_delay_secs(),
            skip_existing_artifacts: false,
            executor: ExecutorConfig {
                program: "python3".to_string(),
                args: vec!["-m".to_string(), "crews.run".to_string()],
                working_dir: None,
            },
            providers: default_providers(),
            pricing: PricingTable::default(),
            phases: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        self.task_delay()?;
        if self.providers.is_empty() {
            bail!("at least one provider must be configured");
        }
        let mut names = HashSet::new();
        for provider in &self.providers {
            if !names.insert(provider.name.as_str()) {
                bail!("provider {} is configured more than once", provider.name);
            }
            if provider.tokens_per_minute == 0 {
                bail!("provider {} has a zero tokens_per_minute limit", provider.name);
            }
            if provider.model_patterns.is_empty() {
                bail!("provider {} has no model patterns", provider.name);
            }
        }
        let mut numbers: Vec<u32> = self.phases.iter().map(|p| p.number).collect();
        numbers.sort_unstable();
        if numbers.windows(2).any(|w| w[0] == w[1]) {
            bail!("phase numbers must be unique");
        }
        Ok(())
    }

    /// Configured phases in execution order, or the built-in catalog
    pub fn phases(&self) -> Vec<PhaseSpec> {
        if self.phases.is_empty() {
            return default_catalog();
        }
        let mut phases = self.phases.clone();
        phases.sort_by_key(|p| p.number);
        phases
    }

    /// Pause before each crew kickoff
    pub fn task_delay(&self) -> Result<Duration> {
        Duration::try_from_secs_f64(self.task_delay_secs).map_err(|e| {
            anyhow!(
                "task_delay_secs must be a non-negative number of seconds, got {}: {e}",
                self.task_delay_secs
            )
        })
    }

    pub fn runner_settings(&self) -> Result<RunnerSettings> {
        Ok(RunnerSettings {
            artifacts_dir: self.artifacts_dir.clone(),
            default_model: self.default_model.clone(),
            task_delay: self.task_delay()?,
            skip_existing_artifacts: self.skip_existing_artifacts,
        })
    }
}
