//! Configuration loading
//!
//! Handles loading configuration from embedded defaults, files, and environment.

use super::config::AppConfig;
use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};

/// Embedded default configuration (compiled into binary)
pub const DEFAULT_CONFIG: &str = include_str!("../../config/default.toml");

/// Load configuration from files and environment
pub fn load_config() -> Result<AppConfig> {
    let env_name = std::env::var("MASTERY_ENV").unwrap_or_else(|_| "development".to_string());

    let config = Config::builder()
        // 1. Embedded defaults (always available)
        .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
        // 2. External overrides (optional)
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{env_name}")).required(false))
        .add_source(File::with_name("config/local").required(false))
        // 3. Environment variables (highest priority)
        // MASTERY_TASK_DELAY_SECS, MASTERY_EXECUTOR__PROGRAM
        .add_source(environment())
        .build()
        .context("Failed to build configuration")?;

    let config: AppConfig = config
        .try_deserialize()
        .context("Failed to deserialize configuration")?;
    config.validate()?;
    Ok(config)
}

fn environment() -> Environment {
    Environment::with_prefix("MASTERY")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_embedded(overrides: &str) -> AppConfig {
        Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .add_source(File::from_str(overrides, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_embedded_defaults() {
        let config = from_embedded("");
        assert!(config.validate().is_ok());
        assert_eq!(config.state_db_path.to_str(), Some("data/state.db"));
        assert_eq!(config.ledger_path.to_str(), Some("logs/llm_calls.jsonl"));
        assert_eq!(config.task_delay_secs, 2.0);
        assert!(!config.skip_existing_artifacts);

        let names: Vec<&str> = config.providers.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["anthropic", "openai"]);
        assert_eq!(config.providers[0].tokens_per_minute, 7500);
        assert_eq!(config.providers[1].tokens_per_minute, 90_000);

        assert_eq!(config.pricing, mastery_llm::PricingTable::default());
        assert_eq!(config.phases().len(), 4);
    }

    #[test]
    fn test_file_overrides() {
        let config = from_embedded(
            r#"
task_delay_secs = 0.5
skip_existing_artifacts = true

[pricing]
models = [{ model = "local-llm", input = 0.0, output = 0.0 }]

[[phases]]
number = 2
name = "Second"
crew = "SecondCrew"
policy = "continue"
tasks = [{ id = "b", name = "B" }]

[[phases]]
number = 1
name = "First"
crew = "FirstCrew"
tasks = [{ id = "a", name = "A", artifact = "a.md" }]
"#,
        );

        assert!(config.skip_existing_artifacts);
        assert_eq!(
            config.runner_settings().unwrap().task_delay,
            std::time::Duration::from_millis(500)
        );
        assert!(config.pricing.is_known("local-llm"));
        assert!(!config.pricing.is_known("gpt-4o"));

        let phases = config.phases();
        assert_eq!(phases[0].crew, "FirstCrew");
        assert_eq!(phases[1].policy, mastery_core::FailurePolicy::Continue);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = from_embedded("");
        config.task_delay_secs = -1.0;
        assert!(config.validate().is_err());

        let mut config = from_embedded("");
        config.task_delay_secs = 1e30;
        assert!(config.validate().is_err());
        assert!(config.runner_settings().is_err());

        let mut config = from_embedded("");
        config.task_delay_secs = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = from_embedded("");
        config.providers[0].tokens_per_minute = 0;
        assert!(config.validate().is_err());

        let mut config = from_embedded("");
        let duplicate = config.providers[0].clone();
        config.providers.push(duplicate);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("anthropic"));

        let mut config = from_embedded("");
        let mut phases = mastery_core::default_catalog();
        phases[1].number = 1;
        config.phases = phases;
        assert!(config.validate().is_err());
    }
}
