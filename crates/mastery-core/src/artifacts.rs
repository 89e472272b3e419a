//! Artifact checks
//!
//! Crews write their deliverables as markdown files. A file only counts as
//! produced when it holds more than a stub's worth of content.

use chrono::{DateTime, Local};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Smallest artifact size (exclusive) treated as real content
pub const MIN_ARTIFACT_BYTES: u64 = 100;

/// Whether `path` exists and is larger than [`MIN_ARTIFACT_BYTES`]
#[must_use]
pub fn artifact_is_complete(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.len() > MIN_ARTIFACT_BYTES)
        .unwrap_or(false)
}

/// A generated artifact on disk
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactInfo {
    /// File name
    pub name: String,
    /// Full path
    pub path: PathBuf,
    /// Size in bytes
    pub size_bytes: u64,
    /// Last modification time
    pub modified: Option<DateTime<Local>>,
}

/// Markdown artifacts in `dir`, sorted by name
///
/// A missing directory yields an empty list.
pub fn list_artifacts(dir: &Path) -> std::io::Result<Vec<ArtifactInfo>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut artifacts = Vec::new();
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("md") {
            continue;
        }
        let metadata = entry.metadata()?;
        if !metadata.is_file() {
            continue;
        }
        artifacts.push(ArtifactInfo {
            name: entry.file_name().to_string_lossy().into_owned(),
            path,
            size_bytes: metadata.len(),
            modified: metadata.modified().ok().map(DateTime::<Local>::from),
        });
    }

    artifacts.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(artifacts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_size_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let stub = dir.path().join("stub.md");
        let real = dir.path().join("real.md");
        std::fs::write(&stub, "x".repeat(100)).unwrap();
        std::fs::write(&real, "x".repeat(101)).unwrap();

        assert!(!artifact_is_complete(&stub));
        assert!(artifact_is_complete(&real));
        assert!(!artifact_is_complete(&dir.path().join("missing.md")));
        assert!(!artifact_is_complete(dir.path()));
    }

    #[test]
    fn test_list_artifacts_filters_markdown() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("roadmap.md"), "# Roadmap").unwrap();
        std::fs::write(dir.path().join("prd.md"), "# PRD").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        std::fs::create_dir(dir.path().join("drafts.md")).unwrap();

        let names: Vec<String> = list_artifacts(dir.path())
            .unwrap()
            .into_iter()
            .map(|a| a.name)
            .collect();
        assert_eq!(names, vec!["prd.md", "roadmap.md"]);
    }

    #[test]
    fn test_list_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(list_artifacts(&dir.path().join("nope")).unwrap().is_empty());
    }
}
