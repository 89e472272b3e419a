//! CLI command: `mastery artifacts`

use crate::app::AppConfig;
use mastery_core::{list_artifacts, MIN_ARTIFACT_BYTES};

/// Run the artifacts subcommand.
pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    let artifacts = list_artifacts(&config.artifacts_dir)?;

    println!();
    println!("  Artifacts in {}", config.artifacts_dir.display());
    println!("  {}", "-".repeat(72));

    if artifacts.is_empty() {
        println!("  (no artifacts generated yet)");
        println!();
        return Ok(());
    }

    println!("  {:<40} {:>10}  Modified", "File", "Size");
    println!("  {}", "-".repeat(72));
    for artifact in &artifacts {
        let modified = artifact
            .modified
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        let stub = if artifact.size_bytes > MIN_ARTIFACT_BYTES {
            ""
        } else {
            " (stub)"
        };
        println!(
            "  {:<40} {:>10}  {}{}",
            artifact.name,
            format_size(artifact.size_bytes),
            modified,
            stub
        );
    }
    println!();
    Ok(())
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
    }
}
