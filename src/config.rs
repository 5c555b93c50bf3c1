// src/config.rs
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use governor::Quota;
use log::info;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::storage::cache::CacheConfig;

#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: String,
    pub port: u16,

    // RCON targets
    pub rcon_config_path: PathBuf,
    pub logs_path: String,
    pub rcon_timeout_secs: u64,

    // Upstream listing + cache
    pub api_base_url: String,
    pub cache_file: PathBuf,
    pub cache_max_age_secs: u64,
    pub cache_refresh_interval_secs: u64,
    pub cache_wait_secs: u64,

    // Rate limiting configs
    pub api_period_secs: u64,
    pub api_burst_limit: u32,
    pub rcon_period_secs: u64,
    pub rcon_burst_limit: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 3000,
            rcon_config_path: PathBuf::from("/config/rcon.yaml"),
            logs_path: "/logs".to_string(),
            rcon_timeout_secs: 10,
            api_base_url: "https://api.palworldgame.com".to_string(),
            cache_file: PathBuf::from("cache/server_list.json"),
            cache_max_age_secs: 3600,
            cache_refresh_interval_secs: 300,
            cache_wait_secs: 30,
            api_period_secs: 1,
            api_burst_limit: 30,
            rcon_period_secs: 1,
            rcon_burst_limit: 10,
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_address: env_or("BIND_ADDRESS", defaults.bind_address),
            port: env_or("PORT", defaults.port),
            rcon_config_path: env_or("RCON_CONFIG", defaults.rcon_config_path),
            logs_path: env_or("LOGS_PATH", defaults.logs_path),
            rcon_timeout_secs: env_or("RCON_TIMEOUT_SECS", defaults.rcon_timeout_secs).max(1),
            api_base_url: env_or("API_BASE_URL", defaults.api_base_url),
            cache_file: env_or("CACHE_FILE", defaults.cache_file),
            cache_max_age_secs: env_or("CACHE_MAX_AGE_SECS", defaults.cache_max_age_secs),
            cache_refresh_interval_secs: env_or(
                "CACHE_REFRESH_INTERVAL_SECS",
                defaults.cache_refresh_interval_secs,
            )
            .max(1),
            cache_wait_secs: env_or("CACHE_WAIT_SECS", defaults.cache_wait_secs),
            api_period_secs: env_or("API_PERIOD_SECS", defaults.api_period_secs),
            api_burst_limit: env_or("API_BURST_LIMIT", defaults.api_burst_limit),
            rcon_period_secs: env_or("RCON_PERIOD_SECS", defaults.rcon_period_secs),
            rcon_burst_limit: env_or("RCON_BURST_LIMIT", defaults.rcon_burst_limit),
        }
    }

    pub fn bind(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            path: self.cache_file.clone(),
            max_age: Duration::from_secs(self.cache_max_age_secs),
            refresh_interval: Duration::from_secs(self.cache_refresh_interval_secs.max(1)),
        }
    }

    pub fn cache_wait(&self) -> Duration {
        Duration::from_secs(self.cache_wait_secs)
    }

    pub fn rcon_timeout(&self) -> Duration {
        Duration::from_secs(self.rcon_timeout_secs.max(1))
    }

    pub fn api_quota(&self) -> Quota {
        quota(self.api_period_secs, self.api_burst_limit)
    }

    pub fn rcon_quota(&self) -> Quota {
        quota(self.rcon_period_secs, self.rcon_burst_limit)
    }
}

fn quota(period_secs: u64, burst: u32) -> Quota {
    let burst = NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN);
    Quota::with_period(Duration::from_secs(period_secs.max(1)))
        .map(|q| q.allow_burst(burst))
        .unwrap_or_else(|| Quota::per_second(burst))
}

/// One entry of the RCON target file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RconTarget {
    pub address: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
}

impl RconTarget {
    pub fn timeout_or(&self, default: Duration) -> Duration {
        self.timeout
            .as_deref()
            .and_then(parse_timeout)
            .unwrap_or(default)
    }
}

pub type RconTargets = BTreeMap<String, RconTarget>;

/// Accepts `"10"`, `"10s"` and `"1500ms"`. Zero is rejected.
pub fn parse_timeout(value: &str) -> Option<Duration> {
    let value = value.trim();
    let duration = if let Some(ms) = value.strip_suffix("ms") {
        Duration::from_millis(ms.trim().parse().ok()?)
    } else {
        let secs = value.strip_suffix('s').unwrap_or(value);
        Duration::from_secs(secs.trim().parse().ok()?)
    };
    (!duration.is_zero()).then_some(duration)
}

/// Reads the RCON target file. It is re-read on each call so edits are
/// picked up without a restart.
pub fn load_targets(path: &Path) -> Result<RconTargets, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    if raw.trim().is_empty() {
        return Ok(RconTargets::new());
    }
    Ok(serde_yaml::from_str(&raw)?)
}

pub fn find_target(path: &Path, name: &str) -> Result<RconTarget, ConfigError> {
    load_targets(path)?
        .remove(name)
        .ok_or_else(|| ConfigError::UnknownServer(name.to_string()))
}

#[derive(Debug, Deserialize)]
struct JsonTarget {
    name: String,
    address: String,
    password: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    timeout: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JsonTargets {
    servers: Vec<JsonTarget>,
}

/// Converts a `{"servers":[...]}` JSON document into target entries, giving
/// each one a log file under `logs_path`.
pub fn targets_from_json(json: &str, logs_path: &str) -> Result<RconTargets, ConfigError> {
    let parsed: JsonTargets = serde_json::from_str(json)?;
    let logs_path = logs_path.trim_end_matches('/');
    Ok(parsed
        .servers
        .into_iter()
        .map(|server| {
            let target = RconTarget {
                address: server.address,
                password: server.password,
                log: Some(format!("{}/{}.log", logs_path, server.name)),
                kind: server.kind,
                timeout: server.timeout,
            };
            (server.name, target)
        })
        .collect())
}

/// Writes the target file generated from `CONFIG_JSON`, replacing any
/// existing one.
pub fn write_targets_from_json(json: &str, output: &Path, logs_path: &str) -> Result<usize, ConfigError> {
    let targets = targets_from_json(json, logs_path)?;
    let yaml = serde_yaml::to_string(&targets)?;

    let io_err = |source| ConfigError::Io {
        path: output.display().to_string(),
        source,
    };
    if let Some(dir) = output.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(io_err)?;
    }
    fs::write(output, yaml).map_err(io_err)?;

    info!("Generated {} rcon targets into {}", targets.len(), output.display());
    Ok(targets.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_formats() {
        assert_eq!(parse_timeout("10"), Some(Duration::from_secs(10)));
        assert_eq!(parse_timeout(" 5s "), Some(Duration::from_secs(5)));
        assert_eq!(parse_timeout("1500ms"), Some(Duration::from_millis(1500)));
        assert_eq!(parse_timeout("0"), None);
        assert_eq!(parse_timeout("soon"), None);
    }

    #[test]
    fn target_timeout_falls_back() {
        let target = RconTarget {
            address: "127.0.0.1:25575".into(),
            password: "pw".into(),
            log: None,
            kind: None,
            timeout: Some("bogus".into()),
        };
        assert_eq!(target.timeout_or(Duration::from_secs(7)), Duration::from_secs(7));
    }

    #[test]
    fn loads_yaml_targets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rcon.yaml");
        fs::write(
            &path,
            "alpha:\n  address: \"127.0.0.1:25575\"\n  password: \"secret\"\n  type: \"palworld\"\n  timeout: \"3s\"\n",
        )
        .unwrap();

        let targets = load_targets(&path).unwrap();
        let alpha = &targets["alpha"];
        assert_eq!(alpha.address, "127.0.0.1:25575");
        assert_eq!(alpha.kind.as_deref(), Some("palworld"));
        assert_eq!(alpha.timeout_or(Duration::from_secs(10)), Duration::from_secs(3));

        assert!(matches!(
            find_target(&path, "beta"),
            Err(ConfigError::UnknownServer(name)) if name == "beta"
        ));
    }

    #[test]
    fn missing_target_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_targets(&dir.path().join("absent.yaml")),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn json_generates_loadable_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("rcon.yaml");
        let json = r#"{"servers":[
            {"name":"alpha","address":"10.0.0.1:25575","password":"pw","type":"palworld","timeout":"5s"},
            {"name":"beta","address":"10.0.0.2:25575","password":"pw2"}
        ]}"#;

        assert_eq!(write_targets_from_json(json, &path, "/logs/").unwrap(), 2);

        let targets = load_targets(&path).unwrap();
        assert_eq!(targets["alpha"].log.as_deref(), Some("/logs/alpha.log"));
        assert_eq!(targets["beta"].password, "pw2");
        assert_eq!(targets["beta"].timeout, None);
    }

    #[test]
    fn bad_json_is_rejected() {
        assert!(matches!(
            targets_from_json("{not json", "/logs"),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn quotas_tolerate_zero() {
        let config = Config {
            api_period_secs: 0,
            api_burst_limit: 0,
            ..Config::default()
        };
        let _ = config.api_quota();
        let _ = config.rcon_quota();
    }
}
