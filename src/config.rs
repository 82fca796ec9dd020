//! Configuration module for the pipeline subscriber

use std::env;
use std::net::SocketAddr;

use crate::connection::DEFAULT_ENDPOINT;
use crate::error::{PipelineError, Result};
use crate::subscription::Subscription;

/// Endpoint of a locally running feed, used when `LOCAL_ONLY` is set
pub const LOCAL_ENDPOINT: &str = "ws://localhost:8765";

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// API key sent as the bearer credential
    pub api_key: String,

    /// WebSocket endpoint of the pipeline feed
    pub ws_endpoint: String,

    /// Channels to subscribe to for the session
    pub subscriptions: Vec<Subscription>,

    /// How long to stay subscribed, in seconds
    pub duration_secs: u64,

    /// Address for the health/metrics server; disabled when unset
    pub metrics_addr: Option<SocketAddr>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let api_key = env::var("FENIX_API_KEY")
            .map_err(|_| PipelineError::ConfigError("FENIX_API_KEY is not set".to_string()))?;

        let local_only = env::var("LOCAL_ONLY")
            .map(|v| parse_flag(&v))
            .unwrap_or(false);
        let ws_endpoint = if local_only {
            LOCAL_ENDPOINT.to_string()
        } else {
            env::var("FENIX_WS_ENDPOINT").unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string())
        };

        let subscriptions = Subscription::parse_list(
            &env::var("SUBSCRIPTIONS").unwrap_or_else(|_| "trades_by_market:btc-usdt".to_string()),
        )
        .map_err(|e| PipelineError::ConfigError(format!("SUBSCRIPTIONS: {}", e)))?;

        let metrics_addr = match env::var("METRICS_ADDR") {
            Ok(addr) => Some(addr.parse().map_err(|e| {
                PipelineError::ConfigError(format!("METRICS_ADDR {}: {}", addr, e))
            })?),
            Err(_) => None,
        };

        Ok(Self {
            api_key,
            ws_endpoint,
            subscriptions,
            duration_secs: env::var("DURATION")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),
            metrics_addr,
        })
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "t" | "true" | "1")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            ws_endpoint: DEFAULT_ENDPOINT.to_string(),
            subscriptions: Vec::new(),
            duration_secs: 10,
            metrics_addr: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("true"));
        assert!(parse_flag(" T "));
        assert!(parse_flag("1"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag("yes"));
    }

    #[test]
    fn test_default() {
        let config = Config::default();
        assert_eq!(config.ws_endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.duration_secs, 10);
        assert!(config.metrics_addr.is_none());
    }
}
