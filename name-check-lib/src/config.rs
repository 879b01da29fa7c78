//! Configuration file parsing and management.
//!
//! This module handles loading configuration from TOML files and `NC_*`
//! environment variables, merging them with proper precedence, and
//! applying the result to a [`CheckConfig`].

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::error::NameCheckError;
use crate::types::{CheckConfig, Source, MAX_WORKERS, MIN_WORKERS};

/// Configuration loaded from TOML files.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    /// Default values for CLI options
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defaults: Option<DefaultsConfig>,
}

/// Default configuration values that map to CLI options.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DefaultsConfig {
    /// Concurrent lookups (1-10)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,

    /// Provider key, e.g. "osrs" or "rs3"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Lookup timeout (e.g. "10s", "1m")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,

    /// Pause before each lookup (e.g. "100ms")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<String>,

    /// Location of the progress snapshot
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_file: Option<String>,
}

/// Configuration discovery and loading functionality.
pub struct ConfigManager {
    /// Whether to report which files were picked up
    pub verbose: bool,
}

impl ConfigManager {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Load and validate a configuration file.
    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> Result<FileConfig, NameCheckError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(NameCheckError::file_error(
                path.to_string_lossy(),
                "Configuration file not found",
            ));
        }

        let content = fs::read_to_string(path).map_err(|e| {
            NameCheckError::file_error(
                path.to_string_lossy(),
                format!("Failed to read configuration file: {}", e),
            )
        })?;

        let config: FileConfig = toml::from_str(&content)?;
        self.validate_config(&config)?;

        Ok(config)
    }

    /// Discover and load configuration files in precedence order.
    ///
    /// XDG config < global config < local config; later files win per field.
    pub fn discover_and_load(&self) -> Result<FileConfig, NameCheckError> {
        let mut merged_config = FileConfig::default();
        let mut loaded_files = Vec::new();

        let candidates = [
            self.get_xdg_config_path(),
            self.get_global_config_path(),
            self.get_local_config_path(),
        ];

        for path in candidates.into_iter().flatten() {
            match self.load_file(&path) {
                Ok(config) => {
                    merged_config = self.merge_configs(merged_config, config);
                    loaded_files.push(path);
                }
                Err(e) => warn!(path = %path.display(), error = %e, "skipping config file"),
            }
        }

        if self.verbose {
            for path in &loaded_files {
                info!(path = %path.display(), "loaded config file");
            }
        }

        Ok(merged_config)
    }

    /// Config files in the current directory.
    fn get_local_config_path(&self) -> Option<PathBuf> {
        ["./name-check.toml", "./.name-check.toml"]
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
    }

    /// Config files in the user's home directory.
    fn get_global_config_path(&self) -> Option<PathBuf> {
        let home = env::var_os("HOME")?;
        [".name-check.toml", "name-check.toml"]
            .iter()
            .map(|candidate| Path::new(&home).join(candidate))
            .find(|path| path.exists())
    }

    /// Follows the XDG Base Directory Specification.
    fn get_xdg_config_path(&self) -> Option<PathBuf> {
        let config_dir = env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| env::var_os("HOME").map(|home| Path::new(&home).join(".config")))?;

        let path = config_dir.join("name-check").join("config.toml");
        path.exists().then_some(path)
    }

    /// Values from `higher` take precedence over values from `lower`.
    fn merge_configs(&self, lower: FileConfig, higher: FileConfig) -> FileConfig {
        let defaults = match (lower.defaults, higher.defaults) {
            (Some(lower), Some(higher)) => Some(DefaultsConfig {
                workers: higher.workers.or(lower.workers),
                source: higher.source.or(lower.source),
                timeout: higher.timeout.or(lower.timeout),
                rate_limit: higher.rate_limit.or(lower.rate_limit),
                progress_file: higher.progress_file.or(lower.progress_file),
            }),
            (lower, higher) => higher.or(lower),
        };

        FileConfig { defaults }
    }

    fn validate_config(&self, config: &FileConfig) -> Result<(), NameCheckError> {
        let Some(defaults) = &config.defaults else {
            return Ok(());
        };

        if let Some(workers) = defaults.workers {
            if !(MIN_WORKERS..=MAX_WORKERS).contains(&workers) {
                return Err(NameCheckError::config(format!(
                    "Workers must be between {} and {}",
                    MIN_WORKERS, MAX_WORKERS
                )));
            }
        }

        if let Some(source) = &defaults.source {
            source.parse::<Source>()?;
        }

        for value in [&defaults.timeout, &defaults.rate_limit].into_iter().flatten() {
            if parse_duration(value).is_none() {
                return Err(NameCheckError::config(format!(
                    "Invalid duration '{}'. Use format like '100ms', '5s', '2m'",
                    value
                )));
            }
        }

        if matches!(&defaults.progress_file, Some(path) if path.trim().is_empty()) {
            return Err(NameCheckError::config("progress_file cannot be empty"));
        }

        Ok(())
    }
}

impl FileConfig {
    /// Overlay the values present in this file onto `config`.
    pub fn apply_to(&self, mut config: CheckConfig) -> CheckConfig {
        let Some(defaults) = &self.defaults else {
            return config;
        };

        if let Some(workers) = defaults.workers {
            config = config.with_workers(workers);
        }
        if let Some(source) = defaults.source.as_deref().and_then(|s| s.parse().ok()) {
            config.source = source;
        }
        if let Some(timeout) = defaults.timeout.as_deref().and_then(parse_duration) {
            config.timeout = timeout;
        }
        if let Some(delay) = defaults.rate_limit.as_deref().and_then(parse_duration) {
            config.rate_limit_delay = delay;
        }
        if let Some(path) = &defaults.progress_file {
            config.progress_file = PathBuf::from(path);
        }

        config
    }
}

/// Configuration values read from `NC_*` environment variables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvConfig {
    pub workers: Option<usize>,
    pub source: Option<Source>,
    pub timeout: Option<Duration>,
    pub rate_limit: Option<Duration>,
    pub progress_file: Option<PathBuf>,
    pub config: Option<PathBuf>,
}

impl EnvConfig {
    /// Overlay the values present in the environment onto `config`.
    pub fn apply_to(&self, mut config: CheckConfig) -> CheckConfig {
        if let Some(workers) = self.workers {
            config = config.with_workers(workers);
        }
        if let Some(source) = self.source {
            config.source = source;
        }
        if let Some(timeout) = self.timeout {
            config.timeout = timeout;
        }
        if let Some(delay) = self.rate_limit {
            config.rate_limit_delay = delay;
        }
        if let Some(path) = &self.progress_file {
            config.progress_file = path.clone();
        }
        config
    }
}

/// Load configuration from the process environment.
///
/// Invalid values are logged as warnings and ignored.
pub fn load_env_config() -> EnvConfig {
    env_config_from(|key| env::var(key).ok())
}

/// Parse `NC_*` values through `lookup`, so callers can supply their own source.
pub fn env_config_from<F>(lookup: F) -> EnvConfig
where
    F: Fn(&str) -> Option<String>,
{
    let mut env_config = EnvConfig::default();

    if let Some(val) = lookup("NC_WORKERS") {
        match val.trim().parse::<usize>() {
            Ok(workers) if (MIN_WORKERS..=MAX_WORKERS).contains(&workers) => {
                env_config.workers = Some(workers);
            }
            _ => warn!(value = %val, "ignoring NC_WORKERS, must be 1-10"),
        }
    }

    if let Some(val) = lookup("NC_SOURCE") {
        match val.parse::<Source>() {
            Ok(source) => env_config.source = Some(source),
            Err(e) => warn!(value = %val, error = %e, "ignoring NC_SOURCE"),
        }
    }

    for (key, slot) in [
        ("NC_TIMEOUT", &mut env_config.timeout),
        ("NC_RATE_LIMIT", &mut env_config.rate_limit),
    ] {
        if let Some(val) = lookup(key) {
            match parse_duration(&val) {
                Some(duration) => *slot = Some(duration),
                None => warn!(key, value = %val, "ignoring duration, use format like '100ms', '5s', '2m'"),
            }
        }
    }

    for (key, slot) in [
        ("NC_PROGRESS_FILE", &mut env_config.progress_file),
        ("NC_CONFIG", &mut env_config.config),
    ] {
        if let Some(val) = lookup(key) {
            if !val.trim().is_empty() {
                *slot = Some(PathBuf::from(val.trim()));
            }
        }
    }

    env_config
}

/// Parse a duration like "150ms", "5s", "2m"; a bare number means seconds.
pub fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim().to_lowercase();

    if let Some(ms) = value.strip_suffix("ms") {
        ms.trim().parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = value.strip_suffix('s') {
        secs.trim().parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = value.strip_suffix('m') {
        mins.trim()
            .parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else {
        value.parse::<u64>().ok().map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();
        temp_file.flush().unwrap();
        temp_file
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("100ms"), Some(Duration::from_millis(100)));
        assert_eq!(parse_duration("5s"), Some(Duration::from_secs(5)));
        assert_eq!(parse_duration("2m"), Some(Duration::from_secs(120)));
        assert_eq!(parse_duration("7"), Some(Duration::from_secs(7)));
        assert_eq!(parse_duration("soon"), None);
    }

    #[test]
    fn test_parse_duration_rejects_overflowing_minutes() {
        assert_eq!(parse_duration("307445734561825861m"), None);
        assert_eq!(
            parse_duration("307445734561825860m"),
            Some(Duration::from_secs(307445734561825860 * 60))
        );

        let env_config = env_config_from(|key| {
            (key == "NC_TIMEOUT").then(|| "307445734561825861m".to_string())
        });
        assert_eq!(env_config.timeout, None);
    }

    #[test]
    fn test_load_valid_config() {
        let temp_file = write_config(
            r#"
[defaults]
workers = 8
source = "rs3"
timeout = "20s"
rate_limit = "250ms"
progress_file = "runs/progress.json"
"#,
        );

        let manager = ConfigManager::new(false);
        let config = manager.load_file(temp_file.path()).unwrap();
        let applied = config.apply_to(CheckConfig::default());

        assert_eq!(applied.workers, 8);
        assert_eq!(applied.source, Source::Rs3);
        assert_eq!(applied.timeout, Duration::from_secs(20));
        assert_eq!(applied.rate_limit_delay, Duration::from_millis(250));
        assert_eq!(applied.progress_file, PathBuf::from("runs/progress.json"));
    }

    #[test]
    fn test_invalid_workers() {
        let temp_file = write_config("[defaults]\nworkers = 0\n");
        let manager = ConfigManager::new(false);
        assert!(manager.load_file(temp_file.path()).is_err());

        let temp_file = write_config("[defaults]\nworkers = 11\n");
        assert!(manager.load_file(temp_file.path()).is_err());
    }

    #[test]
    fn test_invalid_source_and_duration() {
        let manager = ConfigManager::new(false);

        let temp_file = write_config("[defaults]\nsource = \"wow\"\n");
        assert!(manager.load_file(temp_file.path()).is_err());

        let temp_file = write_config("[defaults]\ntimeout = \"later\"\n");
        assert!(manager.load_file(temp_file.path()).is_err());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let manager = ConfigManager::new(false);
        assert!(manager.load_file("/definitely/not/here.toml").is_err());
    }

    #[test]
    fn test_merge_configs() {
        let manager = ConfigManager::new(false);

        let lower = FileConfig {
            defaults: Some(DefaultsConfig {
                workers: Some(2),
                source: Some("rs3".to_string()),
                ..Default::default()
            }),
        };
        let higher = FileConfig {
            defaults: Some(DefaultsConfig {
                workers: Some(9),
                ..Default::default()
            }),
        };

        let defaults = manager.merge_configs(lower, higher).defaults.unwrap();
        assert_eq!(defaults.workers, Some(9)); // Higher wins
        assert_eq!(defaults.source, Some("rs3".to_string())); // Lower preserved
    }

    #[test]
    fn test_env_config_parsing() {
        let vars: HashMap<&str, &str> = [
            ("NC_WORKERS", "3"),
            ("NC_SOURCE", "RS3"),
            ("NC_TIMEOUT", "30s"),
            ("NC_RATE_LIMIT", "bogus"),
            ("NC_PROGRESS_FILE", " other.json "),
        ]
        .into_iter()
        .collect();

        let env_config = env_config_from(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(env_config.workers, Some(3));
        assert_eq!(env_config.source, Some(Source::Rs3));
        assert_eq!(env_config.timeout, Some(Duration::from_secs(30)));
        assert_eq!(env_config.rate_limit, None);
        assert_eq!(env_config.progress_file, Some(PathBuf::from("other.json")));
        assert_eq!(env_config.config, None);
    }

    #[test]
    fn test_env_rejects_out_of_range_workers() {
        let env_config = env_config_from(|key| (key == "NC_WORKERS").then(|| "42".to_string()));
        assert_eq!(env_config.workers, None);
    }

    #[test]
    fn test_env_overrides_file() {
        let file = FileConfig {
            defaults: Some(DefaultsConfig {
                workers: Some(2),
                source: Some("osrs".to_string()),
                ..Default::default()
            }),
        };
        let env_config = EnvConfig {
            workers: Some(7),
            ..Default::default()
        };

        let config = env_config.apply_to(file.apply_to(CheckConfig::default()));
        assert_eq!(config.workers, 7);
        assert_eq!(config.source, Source::Osrs);
    }
}
