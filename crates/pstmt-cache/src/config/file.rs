//! TOML configuration file loading

use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::builder::ConfigBuilder;
use crate::Result;

/// Configuration file locations checked in order
const CONFIG_PATHS: &[&str] = &[
    "./pstmt-cache.toml",
    "~/.config/pstmt-cache/config.toml",
    "/etc/pstmt-cache/config.toml",
];

/// Find the first existing configuration file
pub fn find_config_file() -> Option<PathBuf> {
    for path_str in CONFIG_PATHS {
        let path = if path_str.starts_with('~') {
            if let Ok(home) = std::env::var("HOME") {
                PathBuf::from(path_str.replacen('~', &home, 1))
            } else {
                continue;
            }
        } else {
            PathBuf::from(path_str)
        };

        if path.exists() {
            return Some(path);
        }
    }
    None
}

/// Load configuration from a TOML file
pub fn load_from_file(path: &Path, builder: ConfigBuilder) -> Result<ConfigBuilder> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        crate::Error::Config(format!(
            "Failed to read config file {}: {}",
            path.display(),
            e
        ))
    })?;

    let file_config: FileConfig = toml::from_str(&content).map_err(|e| {
        crate::Error::Config(format!(
            "Failed to parse config file {}: {}",
            path.display(),
            e
        ))
    })?;

    Ok(apply_file_config(builder, file_config))
}

fn apply_file_config(mut builder: ConfigBuilder, config: FileConfig) -> ConfigBuilder {
    if let Some(cache) = config.cache {
        if let Some(name) = cache.name {
            builder = builder.cache_name(name);
        }

        if let Some(log_queries) = cache.log_queries {
            builder = builder.log_queries(log_queries);
        }

        if let Some(prewarm) = cache.prewarm {
            builder = builder.prewarm(prewarm);
        }
    }

    if let Some(obs) = config.observability {
        if let Some(level) = obs.log_level {
            builder = builder.log_level(level);
        }

        if let Some(json) = obs.json_logs {
            builder = builder.json_logs(json);
        }
    }

    builder
}

/// Root configuration file structure
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    cache: Option<CacheFileConfig>,
    observability: Option<ObservabilityConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CacheFileConfig {
    name: Option<String>,
    log_queries: Option<bool>,
    prewarm: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ObservabilityConfig {
    log_level: Option<String>,
    json_logs: Option<bool>,
}
