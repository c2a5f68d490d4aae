use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default = "default_source_base_url")]
    pub source_base_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_fetch_retries")]
    pub fetch_retries: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_max_jobs_limit")]
    pub max_jobs_limit: u32,
    #[serde(default = "default_max_jobs")]
    pub default_max_jobs: u32,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,
    /// Allowed CORS origins. Empty allows any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_source_base_url() -> String {
    "https://www.actuarylist.com".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_fetch_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_max_jobs_limit() -> u32 {
    200
}

fn default_max_jobs() -> u32 {
    50
}

fn default_poll_interval_secs() -> u64 {
    2
}

fn default_broadcast_capacity() -> usize {
    256
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            data_dir: None,
            source_base_url: default_source_base_url(),
            user_agent: default_user_agent(),
            request_timeout_secs: default_request_timeout_secs(),
            fetch_retries: default_fetch_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            max_jobs_limit: default_max_jobs_limit(),
            default_max_jobs: default_max_jobs(),
            poll_interval_secs: default_poll_interval_secs(),
            broadcast_capacity: default_broadcast_capacity(),
            cors_origins: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_board_config_defaults() {
        let config = BoardConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 5000);
        assert!(config.data_dir.is_none());
        assert_eq!(config.source_base_url, "https://www.actuarylist.com");
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.fetch_retries, 3);
        assert_eq!(config.retry_backoff_ms, 500);
        assert_eq!(config.max_jobs_limit, 200);
        assert_eq!(config.default_max_jobs, 50);
        assert_eq!(config.poll_interval_secs, 2);
        assert_eq!(config.broadcast_capacity, 256);
        assert!(config.cors_origins.is_empty());
    }

    #[test]
    fn test_board_config_partial_deserialization_empty() {
        let config: BoardConfig = serde_json::from_str("{}").expect("deserialize");
        assert_eq!(config.port, 5000);
        assert_eq!(config.fetch_retries, 3);
        assert_eq!(config.max_jobs_limit, 200);
    }

    #[test]
    fn test_board_config_partial_deserialization_some_fields() {
        let json = r#"{"port": 9000, "fetch_retries": 5, "cors_origins": ["http://localhost:3000"]}"#;
        let config: BoardConfig = serde_json::from_str(json).expect("deserialize");
        assert_eq!(config.host, "127.0.0.1"); // default
        assert_eq!(config.port, 9000);
        assert_eq!(config.fetch_retries, 5);
        assert_eq!(config.cors_origins, vec!["http://localhost:3000"]);
        assert_eq!(config.poll_interval_secs, 2); // default
    }

    #[test]
    fn test_board_config_with_data_dir() {
        let json = r#"{"data_dir": "/custom/path"}"#;
        let config: BoardConfig = serde_json::from_str(json).expect("deserialize");
        assert_eq!(config.data_dir, Some(PathBuf::from("/custom/path")));
    }

    #[test]
    fn test_board_config_serde_roundtrip() {
        let config = BoardConfig::default();
        let json = serde_json::to_string(&config).expect("serialize");
        let deserialized: BoardConfig = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(deserialized.source_base_url, config.source_base_url);
        assert_eq!(deserialized.user_agent, config.user_agent);
        assert_eq!(deserialized.max_jobs_limit, config.max_jobs_limit);
    }
}
