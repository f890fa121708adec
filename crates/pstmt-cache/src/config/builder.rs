//! Configuration builder

use crate::Error;

/// Default label attached to logs and metrics of a cache.
pub const DEFAULT_CACHE_NAME: &str = "pstmt-cache";

/// Per-cache configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Label used in tracing fields and metric labels
    pub name: String,
    /// Include query text in log events. Off by default because query text
    /// can reveal schema details.
    pub log_queries: bool,
    /// Query texts compiled by `warm_up`, in order
    pub prewarm: Vec<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            name: DEFAULT_CACHE_NAME.to_string(),
            log_queries: false,
            prewarm: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub const fn with_log_queries(mut self, enabled: bool) -> Self {
        self.log_queries = enabled;
        self
    }

    #[must_use]
    pub fn with_prewarm<I, S>(mut self, queries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prewarm = queries.into_iter().map(Into::into).collect();
        self
    }
}

/// Logging configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// `EnvFilter` directive; empty means `info`
    pub log_level: String,
    pub json_logs: bool,
}

/// Full configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub cache: CacheConfig,
    pub telemetry: TelemetryConfig,
}

impl Config {
    #[must_use]
    pub const fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    #[must_use]
    pub const fn cache(&self) -> &CacheConfig {
        &self.cache
    }

    #[must_use]
    pub const fn telemetry(&self) -> &TelemetryConfig {
        &self.telemetry
    }
}

/// Configuration builder with fluent API
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    name: Option<String>,
    log_queries: bool,
    prewarm: Vec<String>,
    telemetry: TelemetryConfig,
}

impl ConfigBuilder {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            name: None,
            log_queries: false,
            prewarm: Vec::new(),
            telemetry: TelemetryConfig {
                log_level: String::new(),
                json_logs: false,
            },
        }
    }

    #[must_use]
    pub fn cache_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub const fn log_queries(mut self, enabled: bool) -> Self {
        self.log_queries = enabled;
        self
    }

    /// Replace the prewarm list
    #[must_use]
    pub fn prewarm(mut self, queries: Vec<String>) -> Self {
        self.prewarm = queries;
        self
    }

    #[must_use]
    pub fn add_prewarm(mut self, query: impl Into<String>) -> Self {
        self.prewarm.push(query.into());
        self
    }

    #[must_use]
    pub fn log_level(mut self, level: String) -> Self {
        self.telemetry.log_level = level;
        self
    }

    #[must_use]
    pub const fn json_logs(mut self, enabled: bool) -> Self {
        self.telemetry.json_logs = enabled;
        self
    }

    pub fn build(self) -> crate::Result<Config> {
        let name = self.name.unwrap_or_else(|| DEFAULT_CACHE_NAME.to_string());
        if name.trim().is_empty() {
            return Err(Error::Config("cache name must not be empty".into()));
        }

        if let Some(pos) = self.prewarm.iter().position(|q| q.trim().is_empty()) {
            return Err(Error::Config(format!("prewarm query #{pos} is empty")));
        }

        Ok(Config {
            cache: CacheConfig {
                name,
                log_queries: self.log_queries,
                prewarm: self.prewarm,
            },
            telemetry: self.telemetry,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_config_default() {
        let config = CacheConfig::default();
        assert_eq!(config.name, DEFAULT_CACHE_NAME);
        assert!(!config.log_queries);
        assert!(config.prewarm.is_empty());
    }

    #[test]
    fn test_cache_config_with_methods() {
        let config = CacheConfig::new()
            .with_name("orders-db")
            .with_log_queries(true)
            .with_prewarm(["SELECT 1", "SELECT 2"]);
        assert_eq!(config.name, "orders-db");
        assert!(config.log_queries);
        assert_eq!(config.prewarm, vec!["SELECT 1", "SELECT 2"]);
    }

    #[test]
    fn test_builder_defaults() {
        let config = ConfigBuilder::new().build().unwrap();
        assert_eq!(config.cache, CacheConfig::default());
        assert_eq!(config.telemetry, TelemetryConfig::default());
    }

    #[test]
    fn test_builder_full() {
        let config = Config::builder()
            .cache_name("reports")
            .log_queries(true)
            .add_prewarm("SELECT 1")
            .add_prewarm("SELECT id FROM t")
            .log_level("debug".to_string())
            .json_logs(true)
            .build()
            .unwrap();

        assert_eq!(config.cache().name, "reports");
        assert!(config.cache().log_queries);
        assert_eq!(config.cache().prewarm.len(), 2);
        assert_eq!(config.telemetry().log_level, "debug");
        assert!(config.telemetry().json_logs);
    }

    #[test]
    fn test_builder_rejects_blank_name() {
        let err = ConfigBuilder::new().cache_name("  ").build().unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_builder_rejects_empty_prewarm_query() {
        let err = ConfigBuilder::new()
            .prewarm(vec!["SELECT 1".into(), String::new()])
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("#1"));
    }
}
