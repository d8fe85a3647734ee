//! Player configuration

use std::env;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::infrastructure::http_client::{DEFAULT_API_BASE_URL, DEFAULT_REQUEST_TIMEOUT_MS};
use crate::infrastructure::websocket::{ConnectionConfig, ReconnectPolicy};
use crate::state::{LogPolicy, StorePolicy, UnknownEntityPolicy};

/// Player configuration loaded from environment
#[derive(Debug, Clone)]
pub struct PlayerConfig {
    /// REST base URL of the backend
    pub api_url: String,
    /// WebSocket base URL; derived from `api_url` unless set
    pub ws_url: String,
    /// Sent as `?client_id=` on the game socket
    pub client_id: String,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub heartbeat_interval: Duration,
    pub reconnect: ReconnectPolicy,
    pub store: StorePolicy,
}

impl PlayerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup (tests pass a map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let number = |key: &str, default: u64| -> u64 {
            lookup(key)
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(default)
        };

        let api_url = lookup("RULEHAUNT_API_URL")
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let ws_url = lookup("RULEHAUNT_WS_URL").unwrap_or_else(|| derive_ws_url(&api_url));
        let client_id = lookup("RULEHAUNT_CLIENT_ID")
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| format!("player-{}", uuid::Uuid::new_v4()));

        let defaults = ReconnectPolicy::default();
        let reconnect = ReconnectPolicy {
            initial_delay: Duration::from_millis(number(
                "RULEHAUNT_RECONNECT_DELAY_MS",
                defaults.initial_delay.as_millis() as u64,
            )),
            max_delay: Duration::from_millis(number(
                "RULEHAUNT_RECONNECT_MAX_DELAY_MS",
                defaults.max_delay.as_millis() as u64,
            )),
            max_attempts: lookup("RULEHAUNT_RECONNECT_MAX_ATTEMPTS")
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(defaults.max_attempts),
            ..defaults
        };

        let unknown_entity = match lookup("RULEHAUNT_UNKNOWN_ENTITY_POLICY") {
            Some(value) => value
                .parse::<UnknownEntityPolicy>()
                .context("RULEHAUNT_UNKNOWN_ENTITY_POLICY must be `drop` or `append`")?,
            None => UnknownEntityPolicy::default(),
        };
        let log = LogPolicy {
            max_entries: lookup("RULEHAUNT_MAX_LOG_ENTRIES")
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(LogPolicy::DEFAULT_MAX_ENTRIES),
            dedupe: lookup("RULEHAUNT_DEDUPE_LOGS")
                .and_then(|s| parse_bool(&s))
                .unwrap_or(true),
        };

        Ok(Self {
            api_url,
            ws_url,
            client_id,
            request_timeout: Duration::from_millis(number(
                "RULEHAUNT_REQUEST_TIMEOUT_MS",
                DEFAULT_REQUEST_TIMEOUT_MS,
            )),
            connect_timeout: Duration::from_millis(number("RULEHAUNT_CONNECT_TIMEOUT_MS", 10_000)),
            heartbeat_interval: Duration::from_millis(
                lookup("RULEHAUNT_HEARTBEAT_MS")
                    .and_then(|s| s.trim().parse().ok())
                    .filter(|ms: &u64| *ms > 0)
                    .unwrap_or(30_000),
            ),
            reconnect,
            store: StorePolicy {
                unknown_entity,
                log,
            },
        })
    }

    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig::new(self.ws_url.clone())
            .with_client_id(self.client_id.clone())
            .with_connect_timeout(self.connect_timeout)
            .with_heartbeat_interval(self.heartbeat_interval)
            .with_reconnect_policy(self.reconnect)
    }
}

/// `http://host` -> `ws://host`, `https://host` -> `wss://host`
fn derive_ws_url(api_url: &str) -> String {
    if let Some(rest) = api_url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = api_url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        api_url.to_string()
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
