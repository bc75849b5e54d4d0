//! Writing the default configuration file.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::common::constants::*;
use crate::common::utils::private_path;

/// Write a commented default `sunrise-alarm.toml` at `path`.
pub fn create_default_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create config directory")?;
    }

    fs::write(path, default_config_content())
        .with_context(|| format!("Failed to write default config to {}", private_path(path)))?;
    Ok(())
}

pub fn default_config_content() -> String {
    let mut content = ConfigBuilder::new()
        .add_section("Sunrise source")
        .add_setting(
            "api_endpoint",
            &format!("\"{DEFAULT_API_ENDPOINT}\""),
            "Sunrise source endpoint",
        )
        .add_setting(
            "request_timeout_secs",
            &DEFAULT_REQUEST_TIMEOUT_SECS.to_string(),
            &format!(
                "Request timeout in seconds ({MINIMUM_REQUEST_TIMEOUT_SECS}-{MAXIMUM_REQUEST_TIMEOUT_SECS})"
            ),
        )
        .add_setting(
            "timezone",
            &format!("\"{DEFAULT_TIMEZONE}\""),
            "\"auto\" (from coordinates) or an IANA zone name",
        )
        .add_section("Scheduling")
        .add_setting(
            "busy_policy",
            &format!("\"{DEFAULT_BUSY_POLICY}\""),
            "While an alarm operation runs: \"reject\" or \"queue\"",
        )
        .build();
    content.push('\n');
    content
}

/// Builds TOML with section headers and aligned trailing comments.
struct ConfigBuilder {
    entries: Vec<ConfigEntry>,
}

enum ConfigEntry {
    Section(String),
    Setting { line: String, comment: String },
}

impl ConfigBuilder {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn add_section(mut self, title: &str) -> Self {
        self.entries.push(ConfigEntry::Section(format!("#[{title}]")));
        self
    }

    fn add_setting(mut self, key: &str, value: &str, comment: &str) -> Self {
        self.entries.push(ConfigEntry::Setting {
            line: format!("{key} = {value}"),
            comment: format!("# {comment}"),
        });
        self
    }

    fn build(self) -> String {
        // One space between the longest setting and its comment
        let width = self
            .entries
            .iter()
            .filter_map(|entry| match entry {
                ConfigEntry::Setting { line, .. } => Some(line.len()),
                ConfigEntry::Section(_) => None,
            })
            .max()
            .unwrap_or(0)
            + 1;

        let mut lines = Vec::new();
        for entry in self.entries {
            match entry {
                ConfigEntry::Section(header) => {
                    if !lines.is_empty() {
                        lines.push(String::new());
                    }
                    lines.push(header);
                }
                ConfigEntry::Setting { line, comment } => {
                    lines.push(format!("{line:<width$}{comment}"));
                }
            }
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, load_from_path};
    use tempfile::tempdir;

    #[test]
    fn test_default_content_parses_to_defaults() {
        let config: Config = toml::from_str(&default_config_content()).unwrap();
        assert_eq!(config.api_endpoint.as_deref(), Some(DEFAULT_API_ENDPOINT));
        assert_eq!(config.request_timeout_secs, Some(DEFAULT_REQUEST_TIMEOUT_SECS));
        assert_eq!(config.timezone.as_deref(), Some(DEFAULT_TIMEZONE));
        assert_eq!(config.busy_policy.as_deref(), Some(DEFAULT_BUSY_POLICY));
    }

    #[test]
    fn test_comments_are_aligned() {
        let content = default_config_content();
        let columns: Vec<usize> = content
            .lines()
            .filter(|line| !line.starts_with('#') && !line.is_empty())
            .map(|line| line.find(" # ").unwrap())
            .collect();
        assert_eq!(columns.len(), 4);
        assert!(columns.windows(2).all(|pair| pair[0] == pair[1]));
        assert!(content.contains("\n\n#[Scheduling]\n"));
    }

    #[test]
    fn test_create_default_config_writes_loadable_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);

        create_default_config(&path).unwrap();
        let config = load_from_path(&path).unwrap();
        assert_eq!(config.busy_policy.as_deref(), Some("reject"));
    }
}
