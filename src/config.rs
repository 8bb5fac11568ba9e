use anyhow::{Context, Result};
use directories::ProjectDirs;
use fleetstats_core::domain::EvictionPolicy;
use fleetstats_core::error::FatalError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::CliArgs;

/// Discovery threads are capped no matter what the config asks for
pub const MAX_DISCOVERY_WORKERS: usize = 8;

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub processing: ProcessingConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub collection: CollectionConfig,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct DiscoveryConfig {
    pub max_depth: usize,
    pub include_patterns: Vec<String>,
    pub exclude_patterns: Vec<String>,
    pub workers: usize,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    pub max_workers: usize,
    pub batch_size: usize,
    pub progress_interval_secs: u64,
    /// Per-repository time budget, 0 disables it
    pub timeout_secs: u64,
    pub cleanup_on_error: bool,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    pub file_name: String,
    pub entry_ceiling: usize,
    pub entry_retain: usize,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct CollectionConfig {
    pub filter_by_extensions: bool,
    pub allowed_extensions: Vec<String>,
}

fn default_version() -> u32 {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            discovery: DiscoveryConfig::default(),
            processing: ProcessingConfig::default(),
            cache: CacheConfig::default(),
            collection: CollectionConfig::default(),
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            max_depth: 10,
            include_patterns: Vec::new(),
            exclude_patterns: default_exclude_patterns(),
            workers: 4,
        }
    }
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_workers: 2,
            batch_size: 10,
            progress_interval_secs: 5,
            timeout_secs: 3600,
            cleanup_on_error: true,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        let policy = EvictionPolicy::default();
        Self {
            file_name: "fleetstats.cache".to_string(),
            entry_ceiling: policy.ceiling,
            entry_retain: policy.retain,
        }
    }
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            filter_by_extensions: true,
            allowed_extensions: crate::extensions::DEFAULT_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
        }
    }
}

/// Hidden directories plus well-known build and dependency directories
pub fn default_exclude_patterns() -> Vec<String> {
    [".*", "node_modules", "venv", "__pycache__", "build", "dist", "target", "bin", "obj"]
        .iter()
        .map(|p| p.to_string())
        .collect()
}

pub fn get_default_config_path() -> Result<PathBuf> {
    let proj_dirs = ProjectDirs::from("", "", "fleetstats")
        .context("Failed to determine project directories")?;

    let config_dir = proj_dirs.config_dir();
    Ok(config_dir.join("fleetstats.toml"))
}

impl Config {
    /// Load from `config_path` (or the default location). A missing file yields defaults.
    pub fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let path = match config_path {
            Some(p) => p,
            None => get_default_config_path()?,
        };

        if !path.exists() {
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .context("Failed to serialize config to TOML")?;

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        fs::write(&path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// Defaults < config file < CLI flags < `--set key=value` overrides, then validated.
    pub fn from_cli_and_file(cli_args: &CliArgs) -> Result<Self, FatalError> {
        let mut config = Self::load(cli_args.config.clone()).map_err(|source| FatalError::ConfigFile {
            path: cli_args
                .config
                .clone()
                .or_else(|| get_default_config_path().ok())
                .unwrap_or_default(),
            source,
        })?;

        // CLI args override config file
        if let Some(max_depth) = cli_args.max_depth {
            config.discovery.max_depth = max_depth;
        }
        if !cli_args.include.is_empty() {
            config.discovery.include_patterns = cli_args.include.clone();
        }
        if !cli_args.exclude.is_empty() {
            config.discovery.exclude_patterns = cli_args.exclude.clone();
        }
        if let Some(workers) = cli_args.workers {
            config.processing.max_workers = workers;
        }
        if let Some(batch_size) = cli_args.batch_size {
            config.processing.batch_size = batch_size;
        }
        if let Some(timeout) = cli_args.timeout {
            config.processing.timeout_secs = timeout;
        }
        if cli_args.no_cleanup {
            config.processing.cleanup_on_error = false;
        }

        for assignment in &cli_args.set {
            let (key, value) = assignment.split_once('=').ok_or_else(|| FatalError::InvalidConfig {
                reason: format!("expected key=value, got {:?}", assignment),
            })?;
            config.apply_override(key.trim(), value.trim())?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Set one option by its flat name, as given to `--set`.
    pub fn apply_override(&mut self, key: &str, value: &str) -> Result<(), FatalError> {
        match key {
            "max_depth" => self.discovery.max_depth = parse_value(key, value)?,
            "include_patterns" => self.discovery.include_patterns = parse_list(value),
            "exclude_patterns" => self.discovery.exclude_patterns = parse_list(value),
            "discovery_workers" => self.discovery.workers = parse_value(key, value)?,
            "max_workers" => self.processing.max_workers = parse_value(key, value)?,
            "batch_size" => self.processing.batch_size = parse_value(key, value)?,
            "progress_interval" => self.processing.progress_interval_secs = parse_value(key, value)?,
            "timeout" => self.processing.timeout_secs = parse_value(key, value)?,
            "cleanup_on_error" => self.processing.cleanup_on_error = parse_bool(key, value)?,
            "cache_entry_ceiling" => self.cache.entry_ceiling = parse_value(key, value)?,
            "cache_entry_retain" => self.cache.entry_retain = parse_value(key, value)?,
            "filter_by_extensions" => self.collection.filter_by_extensions = parse_bool(key, value)?,
            _ => return Err(FatalError::UnknownConfigKey { key: key.to_string() }),
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), FatalError> {
        let invalid = |reason: &str| {
            Err(FatalError::InvalidConfig {
                reason: reason.to_string(),
            })
        };

        if self.discovery.workers == 0 {
            return invalid("discovery workers must be at least 1");
        }
        if self.processing.max_workers == 0 {
            return invalid("max_workers must be at least 1");
        }
        if self.processing.batch_size == 0 {
            return invalid("batch_size must be at least 1");
        }
        if self.cache.entry_retain == 0 {
            return invalid("cache entry_retain must be at least 1");
        }
        if self.cache.entry_retain > self.cache.entry_ceiling {
            return invalid("cache entry_retain must not exceed entry_ceiling");
        }
        if self.cache.file_name.is_empty() || self.cache.file_name.contains(['/', '\\']) {
            return invalid("cache file_name must be a plain file name");
        }
        for pattern in self.discovery.include_patterns.iter().chain(&self.discovery.exclude_patterns) {
            if let Err(e) = glob::Pattern::new(pattern) {
                return Err(FatalError::InvalidConfig {
                    reason: format!("bad glob pattern {:?}: {}", pattern, e),
                });
            }
        }
        Ok(())
    }

    pub fn discovery_workers(&self) -> usize {
        self.discovery.workers.clamp(1, MAX_DISCOVERY_WORKERS)
    }

    pub fn eviction_policy(&self) -> EvictionPolicy {
        EvictionPolicy {
            ceiling: self.cache.entry_ceiling,
            retain: self.cache.entry_retain,
        }
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_secs(self.processing.progress_interval_secs)
    }

    /// `None` when repositories may run without a time limit
    pub fn repository_timeout(&self) -> Option<Duration> {
        match self.processing.timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, FatalError> {
    value.parse().map_err(|_| FatalError::InvalidConfigValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, FatalError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Ok(true),
        "false" | "no" | "0" | "off" => Ok(false),
        _ => Err(FatalError::InvalidConfigValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.version, 1);
        assert_eq!(config.discovery.max_depth, 10);
        assert_eq!(config.processing.batch_size, 10);
        assert_eq!(config.processing.progress_interval_secs, 5);
        assert!(config.processing.cleanup_on_error);
        assert_eq!(config.eviction_policy(), EvictionPolicy::default());
        assert!(config.discovery.exclude_patterns.contains(&"node_modules".to_string()));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization_roundtrip() -> Result<()> {
        let mut config = Config::default();
        config.discovery.max_depth = 3;
        config.discovery.include_patterns = vec!["acme-*".to_string()];
        config.processing.cleanup_on_error = false;

        let toml_str = toml::to_string(&config)?;
        let parsed_config: Config = toml::from_str(&toml_str)?;

        assert_eq!(config, parsed_config);
        Ok(())
    }

    #[test]
    fn test_partial_file_keeps_defaults() -> Result<()> {
        let parsed: Config = toml::from_str("version = 1\n[processing]\nbatch_size = 3\n")?;
        assert_eq!(parsed.processing.batch_size, 3);
        assert_eq!(parsed.processing.max_workers, 2);
        assert_eq!(parsed.discovery, DiscoveryConfig::default());
        Ok(())
    }

    #[test]
    fn test_version_defaults_when_omitted() -> Result<()> {
        let parsed: Config = toml::from_str("[processing]\nbatch_size = 3\n")?;
        assert_eq!(parsed.version, 1);
        assert_eq!(parsed.processing.batch_size, 3);
        Ok(())
    }

    #[test]
    fn test_unknown_file_keys_are_rejected() {
        assert!(toml::from_str::<Config>("version = 1\n[processing]\nbatch_sise = 3\n").is_err());
        assert!(toml::from_str::<Config>("verison = 1\n").is_err());
        assert!(toml::from_str::<Config>("[discovery]\nmax_dept = 2\n").is_err());
    }

    #[test]
    fn test_config_load_nonexistent_returns_default() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("nonexistent.toml");

        let config = Config::load(Some(config_path.clone()))?;

        assert_eq!(config, Config::default());
        assert!(!config_path.exists());
        Ok(())
    }

    #[test]
    fn test_config_save_and_load() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("nested").join("test.toml");

        let mut config = Config::default();
        config.processing.max_workers = 6;
        config.cache.entry_ceiling = 200;
        config.cache.entry_retain = 100;

        config.save(&config_path)?;
        let loaded_config = Config::load(Some(config_path))?;

        assert_eq!(config, loaded_config);
        Ok(())
    }

    #[test]
    fn test_cli_override() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("test.toml");

        let mut file_config = Config::default();
        file_config.processing.batch_size = 4;
        file_config.discovery.max_depth = 2;
        file_config.save(&config_path)?;

        let cli_args = CliArgs::parse_from([
            "fleetstats",
            "--config",
            config_path.to_str().unwrap(),
            "--max-depth",
            "7",
            "--no-cleanup",
            "/repos",
            "/out",
        ]);

        let final_config = Config::from_cli_and_file(&cli_args)?;
        assert_eq!(final_config.discovery.max_depth, 7);
        assert_eq!(final_config.processing.batch_size, 4);
        assert!(!final_config.processing.cleanup_on_error);
        Ok(())
    }

    #[test]
    fn test_set_overrides_cli_flags() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let cli_args = CliArgs::parse_from([
            "fleetstats",
            "--config",
            temp_dir.path().join("none.toml").to_str().unwrap(),
            "--batch-size",
            "3",
            "-c",
            "batch_size=8",
            "--set",
            "exclude_patterns=vendor, .*",
            "/repos",
            "/out",
        ]);

        let config = Config::from_cli_and_file(&cli_args)?;
        assert_eq!(config.processing.batch_size, 8);
        assert_eq!(config.discovery.exclude_patterns, vec!["vendor".to_string(), ".*".to_string()]);
        Ok(())
    }

    #[test]
    fn test_unknown_override_key_is_fatal() {
        let mut config = Config::default();
        let err = config.apply_override("no_such_key", "1").unwrap_err();
        assert!(matches!(err, FatalError::UnknownConfigKey { .. }));
    }

    #[test]
    fn test_bad_override_value_is_fatal() {
        let mut config = Config::default();
        let err = config.apply_override("batch_size", "ten").unwrap_err();
        assert!(matches!(err, FatalError::InvalidConfigValue { .. }));

        let err = config.apply_override("cleanup_on_error", "maybe").unwrap_err();
        assert!(matches!(err, FatalError::InvalidConfigValue { .. }));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.processing.batch_size = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.cache.entry_retain = config.cache.entry_ceiling + 1;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.discovery.exclude_patterns = vec!["[".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_timeout_zero_disables_limit() {
        let mut config = Config::default();
        assert_eq!(config.repository_timeout(), Some(Duration::from_secs(3600)));
        config.processing.timeout_secs = 0;
        assert_eq!(config.repository_timeout(), None);
    }

    #[test]
    fn test_discovery_workers_are_capped() {
        let mut config = Config::default();
        config.discovery.workers = 64;
        assert_eq!(config.discovery_workers(), MAX_DISCOVERY_WORKERS);
    }

    #[test]
    fn test_get_default_config_path() -> Result<()> {
        let path = get_default_config_path()?;
        assert!(path.ends_with("fleetstats.toml"));
        Ok(())
    }
}
