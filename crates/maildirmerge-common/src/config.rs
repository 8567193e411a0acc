//! Configuration for maildirmerge

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Merge behaviour
    #[serde(default)]
    pub merge: MergeConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Merge configuration, fixed for the duration of a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MergeConfig {
    /// Proceed even if the destination folder type can't be determined
    #[serde(default)]
    pub force: bool,

    /// Report what would be done without touching the filesystem
    #[serde(default)]
    pub dry_run: bool,

    /// Carry POP3 UIDL values over to the destination
    #[serde(default)]
    pub pop3_uidl: bool,

    /// Merge previously seen messages into a POP3 destination anyway
    #[serde(default)]
    pub pop3_merge_seen: bool,

    /// Subfolder receiving previously seen messages for a POP3 destination
    #[serde(default)]
    pub pop3_redirect: Option<String>,

    /// Subscribe moved folders when the source can't tell us
    #[serde(default)]
    pub subscribe: bool,
}

/// What happens to already-seen mail when the destination is used for POP3
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeenPolicy {
    /// Leave seen messages in the source folder
    LeaveBehind,
    /// Merge seen messages like any other
    Merge,
    /// Move seen messages into the named destination subfolder
    Redirect(String),
}

impl MergeConfig {
    /// Check option combinations before any filesystem work is done
    pub fn validate(&self) -> crate::Result<()> {
        if let Some(ref name) = self.pop3_redirect {
            if self.pop3_merge_seen {
                return Err(crate::Error::Validation(
                    "--pop3-redirect and --pop3-merge-seen are mutually exclusive".to_string(),
                ));
            }
            if name.is_empty() || name == "." || name == ".." {
                return Err(crate::Error::Validation(format!(
                    "Invalid redirect folder name: {:?}",
                    name
                )));
            }
            if name.contains('/') {
                return Err(crate::Error::Validation(format!(
                    "Redirect folder must be a direct subfolder name, not a path: {}",
                    name
                )));
            }
        }
        Ok(())
    }

    /// Resolve the seen-mail policy
    pub fn seen_policy(&self) -> SeenPolicy {
        if self.pop3_merge_seen {
            SeenPolicy::Merge
        } else if let Some(ref name) = self.pop3_redirect {
            SeenPolicy::Redirect(name.clone())
        } else {
            SeenPolicy::LeaveBehind
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "json" or "text"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::Error::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;

        debug!(path = %path.display(), "Loaded configuration file");

        Ok(config)
    }

    /// Load configuration from an explicit file, or from the default locations.
    ///
    /// Without an explicit path, a missing file simply yields the defaults.
    pub fn load(path: Option<&Path>) -> crate::Result<Self> {
        if let Some(path) = path {
            return Self::from_file(path);
        }

        let paths = [
            PathBuf::from("./maildirmerge.toml"),
            PathBuf::from("/etc/maildirmerge.toml"),
        ];

        for path in paths {
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        Ok(Self::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.merge, MergeConfig::default());
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "text");
        assert_eq!(config.merge.seen_policy(), SeenPolicy::LeaveBehind);
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[merge]
dry_run = true
pop3_uidl = true
pop3_redirect = ".POP3-seen"

[logging]
level = "debug"
format = "json"
"#;

        let config: Config = toml::from_str(toml).unwrap();
        assert!(config.merge.dry_run);
        assert!(config.merge.pop3_uidl);
        assert!(!config.merge.force);
        assert_eq!(
            config.merge.seen_policy(),
            SeenPolicy::Redirect(".POP3-seen".to_string())
        );
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_redirect_and_merge_seen_conflict() {
        let config = MergeConfig {
            pop3_merge_seen: true,
            pop3_redirect: Some(".Seen".to_string()),
            ..Default::default()
        };
        assert!(config.validate().unwrap_err().is_usage());
    }

    #[test]
    fn test_redirect_name_validation() {
        for bad in ["", ".", "..", "a/b"] {
            let config = MergeConfig {
                pop3_redirect: Some(bad.to_string()),
                ..Default::default()
            };
            assert!(config.validate().is_err(), "accepted {:?}", bad);
        }

        let config = MergeConfig {
            pop3_redirect: Some(".Seen".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_merge_seen_policy() {
        let config = MergeConfig {
            pop3_merge_seen: true,
            ..Default::default()
        };
        assert_eq!(config.seen_policy(), SeenPolicy::Merge);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("maildirmerge.toml");
        std::fs::write(&path, "[merge]\nsubscribe = true\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert!(config.merge.subscribe);

        let missing = dir.path().join("missing.toml");
        assert!(Config::load(Some(&missing)).is_err());
    }
}
