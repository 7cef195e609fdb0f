//! Assembles the ordered list of command-line patterns to track.

use crate::config::Config;
use anyhow::{bail, Context, Result};
use std::path::Path;
use tracing::debug;

/// Returns the inline `targets` followed by the entries of `targets_file`.
///
/// The file must hold a JSON array of strings. Order is preserved and
/// determines the order of process records within a cycle.
pub fn load_targets(config: &Config) -> Result<Vec<String>> {
    let mut targets = config.targets.clone();
    if let Some(path) = &config.targets_file {
        let from_file = read_targets_file(path)?;
        debug!(path = %path.display(), count = from_file.len(), "Loaded targets file");
        targets.extend(from_file);
    }
    Ok(targets)
}

fn read_targets_file(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read targets file {}", path.display()))?;
    let targets: Vec<String> = serde_json::from_str(&content).with_context(|| {
        format!(
            "Targets file {} must contain a JSON array of strings",
            path.display()
        )
    })?;
    if targets.iter().any(|pattern| pattern.is_empty()) {
        bail!("Targets file {} contains an empty pattern", path.display());
    }
    Ok(targets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn targets_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn test_inline_targets_only() {
        let config = Config {
            targets: vec!["a".to_string(), "b".to_string()],
            ..Default::default()
        };
        assert_eq!(load_targets(&config).unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_inline_then_file_in_order() {
        let file = targets_file(r#"["systemd", "sshd: ", "/usr/bin/dbus-daemon"]"#);
        let config = Config {
            targets: vec!["myapp".to_string()],
            targets_file: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        assert_eq!(
            load_targets(&config).unwrap(),
            vec!["myapp", "systemd", "sshd: ", "/usr/bin/dbus-daemon"]
        );
    }

    #[test]
    fn test_empty_array_is_allowed() {
        let file = targets_file("[]");
        let config = Config {
            targets_file: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        assert!(load_targets(&config).unwrap().is_empty());
    }

    #[test]
    fn test_wrong_shape_is_an_error() {
        for content in [r#"{"targets": ["a"]}"#, "[1, 2]", "not json"] {
            let file = targets_file(content);
            let config = Config {
                targets_file: Some(file.path().to_path_buf()),
                ..Default::default()
            };
            let err = load_targets(&config).unwrap_err();
            assert!(
                err.to_string().contains("JSON array of strings"),
                "unexpected error for {:?}: {}",
                content,
                err
            );
        }
    }

    #[test]
    fn test_empty_pattern_in_file_is_an_error() {
        let file = targets_file(r#"["myapp", ""]"#);
        let config = Config {
            targets_file: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        assert!(load_targets(&config).is_err());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let config = Config {
            targets_file: Some("/nonexistent/targets.json".into()),
            ..Default::default()
        };
        let err = load_targets(&config).unwrap_err();
        assert!(err.to_string().contains("Failed to read targets file"));
    }
}
