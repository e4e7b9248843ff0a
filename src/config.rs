//! Site configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$LISTMGR_CONFIG` (environment variable)
//! 2. `~/.config/listmgr/config.toml` (Linux/macOS)
//!    `%APPDATA%\listmgr\config.toml` (Windows)
//! 3. Built-in defaults

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Paths, logging and host defaults.
    pub general: GeneralConfig,
    /// Site-wide policy that constrains every list.
    pub site: SiteConfig,
    /// List lock tuning.
    pub locks: LockConfig,
}

/// Paths, logging and host defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Root directory for list state and lock files.
    pub data_dir: Option<PathBuf>,
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Host name given to new lists when none is supplied.
    pub default_host: String,
    /// Preferred language given to new lists.
    pub default_language: String,
}

/// Site-wide policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// When false, the "open" subscribe policy is not offered on forms and
    /// submitted policy indexes are shifted by one.
    pub allow_open_subscribe: bool,
    /// Language codes enabled on this site.
    pub languages: Vec<String>,
    /// Option bits given to every newly subscribed member.
    pub default_member_flags: u32,
}

/// List lock tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Lifetime ceiling of a list lock, in seconds.
    pub lifetime_secs: u64,
    /// How long to wait for a busy lock. Defaults to the lifetime ceiling.
    pub timeout_secs: Option<u64>,
    /// Sleep between acquisition attempts, in milliseconds.
    pub poll_interval_ms: u64,
    /// Lifetime of the archiver lock used by archive rebuilds, in seconds.
    pub archiver_lifetime_secs: u64,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            cache_dir: None,
            log_level: "warn".to_string(),
            default_host: "localhost".to_string(),
            default_language: "en".to_string(),
        }
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            allow_open_subscribe: true,
            languages: vec!["en".to_string()],
            default_member_flags: 0,
        }
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            lifetime_secs: 300,
            timeout_secs: None,
            poll_interval_ms: 100,
            archiver_lifetime_secs: 3 * 60 * 60, // 3 hours
        }
    }
}

impl LockConfig {
    /// Lifetime ceiling as a [`Duration`].
    pub fn lifetime(&self) -> Duration {
        Duration::from_secs(self.lifetime_secs)
    }

    /// Acquisition timeout, bounded by the lifetime ceiling.
    pub fn timeout(&self) -> Duration {
        let secs = self
            .timeout_secs
            .map_or(self.lifetime_secs, |t| t.min(self.lifetime_secs));
        Duration::from_secs(secs)
    }

    /// Poll interval as a [`Duration`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Archiver lock lifetime as a [`Duration`].
    pub fn archiver_lifetime(&self) -> Duration {
        Duration::from_secs(self.archiver_lifetime_secs)
    }
}

// ── Load / save ─────────────────────────────────────────────────

/// The config in effect: the file at [`config_file_path`] if it exists and
/// parses, built-in defaults otherwise.
pub fn load_config() -> Config {
    let Some(path) = config_file_path().filter(|p| p.is_file()) else {
        return Config::default();
    };
    match read_config(&path) {
        Ok(cfg) => {
            tracing::info!(path = %path.display(), "Config loaded");
            cfg
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Ignoring unusable config file");
            Config::default()
        }
    }
}

fn read_config(path: &Path) -> anyhow::Result<Config> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

/// Write `config` as TOML to [`config_file_path`].
pub fn save_config(config: &Config) -> anyhow::Result<()> {
    let path = config_file_path().context("no config directory on this platform")?;
    write_config(&path, config)?;
    tracing::info!(path = %path.display(), "Config written");
    Ok(())
}

fn write_config(path: &Path, config: &Config) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    fs::write(path, toml::to_string_pretty(config)?).with_context(|| format!("writing {}", path.display()))
}

/// `$LISTMGR_CONFIG`, else `listmgr/config.toml` under the platform config dir.
pub fn config_file_path() -> Option<PathBuf> {
    match std::env::var_os("LISTMGR_CONFIG") {
        Some(path) => Some(PathBuf::from(path)),
        None => dirs::config_dir().map(|d| d.join("listmgr").join("config.toml")),
    }
}

/// Return the directory holding list state and locks.
pub fn data_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.data_dir {
        return dir.clone();
    }
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("listmgr")
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("listmgr")
}

/// Return the log file path.
pub fn log_file_path(config: &Config) -> PathBuf {
    cache_dir(config).join("listmgr.log")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.general.log_level, "warn");
        assert!(cfg.site.allow_open_subscribe);
        assert_eq!(cfg.site.languages, vec!["en".to_string()]);
        assert_eq!(cfg.locks.lifetime_secs, 300);
        assert_eq!(cfg.locks.archiver_lifetime_secs, 10_800);
    }

    #[test]
    fn test_serialize_deserialize_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).expect("serialize");
        let parsed: Config = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.general.default_host, cfg.general.default_host);
        assert_eq!(parsed.locks.poll_interval_ms, cfg.locks.poll_interval_ms);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let partial = r#"
[site]
allow_open_subscribe = false

[locks]
lifetime_secs = 60
"#;
        let cfg: Config = toml::from_str(partial).expect("parse partial");
        assert!(!cfg.site.allow_open_subscribe);
        assert_eq!(cfg.locks.lifetime_secs, 60);
        // Other fields use defaults
        assert_eq!(cfg.general.default_language, "en");
        assert_eq!(cfg.locks.poll_interval_ms, 100);
    }

    #[test]
    fn test_write_then_read_config_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut cfg = Config::default();
        cfg.general.default_host = "lists.example.org".to_string();
        write_config(&path, &cfg).unwrap();
        assert_eq!(read_config(&path).unwrap().general.default_host, "lists.example.org");

        fs::write(&path, "[locks\nlifetime_secs = ").unwrap();
        assert!(read_config(&path).is_err());
    }

    #[test]
    fn test_timeout_bounded_by_lifetime() {
        let mut locks = LockConfig::default();
        assert_eq!(locks.timeout(), locks.lifetime());
        locks.timeout_secs = Some(10);
        assert_eq!(locks.timeout(), Duration::from_secs(10));
        locks.timeout_secs = Some(10_000);
        assert_eq!(locks.timeout(), locks.lifetime());
    }
}
