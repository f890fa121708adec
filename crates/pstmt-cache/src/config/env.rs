//! Environment variable loading for configuration

use std::env;

use super::builder::ConfigBuilder;
use crate::Result;

/// Environment variable names
mod vars {
    pub const CACHE_NAME: &str = "PSTMT_CACHE_NAME";
    pub const LOG_QUERIES: &str = "PSTMT_CACHE_LOG_QUERIES";
    pub const PREWARM: &str = "PSTMT_CACHE_PREWARM";
    pub const RUST_LOG: &str = "RUST_LOG";
    pub const JSON_LOGS: &str = "PSTMT_JSON_LOGS";
}

/// Separator between prewarm query texts. Query text may contain `;` and
/// `,`, so a doubled semicolon is used.
pub const PREWARM_SEPARATOR: &str = ";;";

/// Load configuration from environment variables
pub fn load_from_env(mut builder: ConfigBuilder) -> Result<ConfigBuilder> {
    if let Ok(name) = env::var(vars::CACHE_NAME) {
        builder = builder.cache_name(name);
    }

    if let Ok(val) = env::var(vars::LOG_QUERIES) {
        builder = builder.log_queries(parse_bool(&val));
    }

    if let Ok(list) = env::var(vars::PREWARM) {
        builder = builder.prewarm(parse_prewarm(&list));
    }

    if let Ok(level) = env::var(vars::RUST_LOG) {
        builder = builder.log_level(level);
    }

    if let Ok(val) = env::var(vars::JSON_LOGS) {
        builder = builder.json_logs(parse_bool(&val));
    }

    Ok(builder)
}

fn parse_bool(s: &str) -> bool {
    matches!(s.to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

fn parse_prewarm(list: &str) -> Vec<String> {
    list.split(PREWARM_SEPARATOR)
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_owned)
        .collect()
}
