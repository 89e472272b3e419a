//! CLI command: `mastery doctor`

use crate::app::{context, AppConfig};
use anyhow::bail;
use std::path::Path;

pub async fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("Mastery Doctor\n");

    let mut all_ok = true;

    all_ok &= check_directories(config);
    all_ok &= check_api_keys(config);
    all_ok &= check_state_db(config).await;
    all_ok &= check_ledger(config);

    println!();
    if !all_ok {
        println!("Some checks failed. Please fix the issues above.");
        bail!("doctor found failing checks");
    }

    println!("All checks passed. Ready to run the pipeline.");
    Ok(())
}

fn check_directories(config: &AppConfig) -> bool {
    let mut ok = true;
    for (label, dir) in [
        ("data", &config.data_dir),
        ("artifacts", &config.artifacts_dir),
        ("logs", &config.logs_dir),
    ] {
        match ensure_writable(dir) {
            Ok(()) => println!("[ok]   {label} directory {}", dir.display()),
            Err(e) => {
                println!("[fail] {label} directory {}: {e}", dir.display());
                ok = false;
            }
        }
    }
    ok
}

fn ensure_writable(dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    let probe = dir.join(".mastery-doctor");
    std::fs::write(&probe, b"ok")?;
    std::fs::remove_file(probe)
}

fn check_api_keys(config: &AppConfig) -> bool {
    let mut configured = 0;
    for provider in &config.providers {
        match provider.check_credentials() {
            Ok(()) => {
                println!("[ok]   {} credentials", provider.name);
                configured += 1;
            }
            Err(e) => println!("[warn] {e}"),
        }
    }
    if configured == 0 {
        println!("[fail] No provider API key set (OPENAI_API_KEY or ANTHROPIC_API_KEY)");
    }
    configured > 0
}

async fn check_state_db(config: &AppConfig) -> bool {
    let summary = match context::open_store(config).await {
        Ok(store) => store.get_summary().await,
        Err(e) => {
            println!("[fail] State database: {e:#}");
            return false;
        }
    };
    match summary {
        Ok(summary) => {
            println!(
                "[ok]   State database {} ({} tasks, {} phases recorded)",
                config.state_db_path.display(),
                summary.total_tasks(),
                summary.phases.len()
            );
            true
        }
        Err(e) => {
            println!("[fail] State database: {e}");
            false
        }
    }
}

fn check_ledger(config: &AppConfig) -> bool {
    let entries = context::open_ledger(config).and_then(|ledger| Ok(ledger.read_entries()?));
    match entries {
        Ok(entries) => {
            println!(
                "[ok]   Cost ledger {} ({} calls)",
                config.ledger_path.display(),
                entries.len()
            );
            true
        }
        Err(e) => {
            println!("[fail] Cost ledger: {e:#}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mastery_llm::ProviderConfig;

    fn config_in(dir: &Path) -> AppConfig {
        AppConfig {
            data_dir: dir.join("data"),
            state_db_path: dir.join("data/state.db"),
            ledger_path: dir.join("logs/llm_calls.jsonl"),
            artifacts_dir: dir.join("artifacts"),
            logs_dir: dir.join("logs"),
            ..AppConfig::default()
        }
    }

    #[tokio::test]
    async fn test_failing_checks_return_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.providers = vec![ProviderConfig::new("locked", &["locked"], 1000)
            .with_api_key_env("MASTERY_TEST_KEY_THAT_IS_NEVER_SET")];

        let err = run(&config).await.unwrap_err();
        assert!(err.to_string().contains("failing checks"));
    }

    #[tokio::test]
    async fn test_passing_checks() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.providers = vec![ProviderConfig::new("local", &["local"], 1000)];

        assert!(run(&config).await.is_ok());
        assert!(dir.path().join("data/state.db").exists());
    }
}
