//! # Settings File
//!
//! `config/SettingsConfig.json` carries the one setting that has no sensible
//! default, the report's output folder:
//!
//! ```json
//! { "output_folder": "/var/lib/stakemap" }
//! ```
//!
//! `--output-dir` wins over the file. When the flag is given the file is
//! not read at all.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

/// Contents of the settings file. Unknown keys are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub output_folder: Option<PathBuf>,
}

impl Settings {
    /// Reads and parses the settings file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse settings file {}", path.display()))
    }
}

/// Picks the report directory: the override if present, otherwise the
/// settings file's `output_folder`. Fails if neither yields a directory.
pub fn resolve_output_dir(override_dir: Option<&Path>, settings_path: &Path) -> Result<PathBuf> {
    if let Some(dir) = override_dir {
        if dir.as_os_str().is_empty() {
            bail!("--output-dir must not be empty");
        }
        return Ok(dir.to_path_buf());
    }

    let settings = Settings::load(settings_path)?;
    match settings.output_folder {
        Some(dir) if !dir.as_os_str().is_empty() => Ok(dir),
        _ => bail!(
            "no output directory: set `output_folder` in {} or pass --output-dir",
            settings_path.display()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings_file(body: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("SettingsConfig.json");
        fs::write(&path, body).unwrap();
        (dir, path)
    }

    #[test]
    fn reads_output_folder() {
        let (_dir, path) = settings_file(r#"{"output_folder": "/data/out", "extra": 1}"#);
        let out = resolve_output_dir(None, &path).unwrap();
        assert_eq!(out, PathBuf::from("/data/out"));
    }

    #[test]
    fn override_wins_and_skips_file() {
        let missing = Path::new("/definitely/not/here.json");
        let out = resolve_output_dir(Some(Path::new("/tmp/report")), missing).unwrap();
        assert_eq!(out, PathBuf::from("/tmp/report"));
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = resolve_output_dir(None, Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(err.to_string().contains("failed to read settings file"));
    }

    #[test]
    fn missing_or_empty_folder_is_an_error() {
        let (_dir, path) = settings_file("{}");
        assert!(resolve_output_dir(None, &path).is_err());

        let (_dir, path) = settings_file(r#"{"output_folder": ""}"#);
        assert!(resolve_output_dir(None, &path).is_err());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let (_dir, path) = settings_file("output_folder = 1");
        let err = resolve_output_dir(None, &path).unwrap_err();
        assert!(err.to_string().contains("failed to parse settings file"));
    }
}
