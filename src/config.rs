use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::history::paginator::{MAX_PAGE_SIZE, MIN_PAGE_SIZE};
use crate::network::LiveConfig;
use crate::network::stomp::Heartbeat;

pub const DEFAULT_CONFIG_PATH: &str = "config/chat.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// REST base; `/api/v1/rooms` is appended.
    pub api_base_url: String,
    /// Raw WebSocket endpoint of the STOMP broker.
    pub ws_url: String,
    pub page_size: u32,
    pub reconnect_delay_ms: u64,
    pub heartbeat_outgoing_ms: u64,
    pub heartbeat_incoming_ms: u64,
    pub connect_timeout_ms: u64,
    /// Distance from the bottom (in view rows) within which new messages auto-scroll.
    pub follow_threshold: f64,
    /// Rows shown by the terminal view.
    pub visible_rows: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8080".to_string(),
            ws_url: "ws://localhost:8080/websocket/websocket".to_string(),
            page_size: 50,
            reconnect_delay_ms: 5_000,
            heartbeat_outgoing_ms: 10_000,
            heartbeat_incoming_ms: 10_000,
            connect_timeout_ms: 10_000,
            follow_threshold: 3.0,
            visible_rows: 20,
        }
    }
}

impl AppConfig {
    pub fn live(&self) -> LiveConfig {
        LiveConfig {
            ws_url: self.ws_url.clone(),
            reconnect_delay: Duration::from_millis(self.reconnect_delay_ms),
            heartbeat: Heartbeat {
                outgoing: Duration::from_millis(self.heartbeat_outgoing_ms),
                incoming: Duration::from_millis(self.heartbeat_incoming_ms),
            },
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
        }
    }

    /// `CHAT_API_URL`, `CHAT_WS_URL` and `CHAT_PAGE_SIZE` win over the file.
    pub fn apply_env_overrides(mut self) -> Self {
        if let Ok(url) = env::var("CHAT_API_URL") {
            self.api_base_url = url;
        }
        if let Ok(url) = env::var("CHAT_WS_URL") {
            self.ws_url = url;
        }
        if let Ok(raw) = env::var("CHAT_PAGE_SIZE") {
            match raw.parse() {
                Ok(size) => self.page_size = size,
                Err(err) => log::warn!("Ignoring CHAT_PAGE_SIZE={raw}: {err}"),
            }
        }
        self.normalized()
    }

    fn normalized(mut self) -> Self {
        let clamped = self.page_size.clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE);
        if clamped != self.page_size {
            log::warn!("page_size {} out of range; using {clamped}", self.page_size);
            self.page_size = clamped;
        }
        self
    }
}

pub fn load_config(path: &str) -> AppConfig {
    let path = Path::new(path);
    let config = match fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<AppConfig>(&content) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("Failed to parse config file {}: {err}", path.display());
                AppConfig::default()
            }
        },
        Err(err) => {
            log::info!(
                "Config file {} not found ({err}); using defaults",
                path.display()
            );
            AppConfig::default()
        }
    };
    config.normalized()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_file(contents: &str) -> std::path::PathBuf {
        let path = env::temp_dir().join(format!("chat-config-{}.json", uuid::Uuid::new_v4()));
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = load_config("/definitely/not/here.json");
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.live().reconnect_delay, Duration::from_secs(5));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let path = scratch_file(r#"{"api_base_url":"http://chat.internal:9000","page_size":500}"#);
        let config = load_config(path.to_str().unwrap());
        fs::remove_file(&path).ok();

        assert_eq!(config.api_base_url, "http://chat.internal:9000");
        assert_eq!(config.page_size, MAX_PAGE_SIZE);
        assert_eq!(config.ws_url, AppConfig::default().ws_url);
    }

    #[test]
    fn malformed_file_yields_defaults() {
        let path = scratch_file("{ not json");
        let config = load_config(path.to_str().unwrap());
        fs::remove_file(&path).ok();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn heartbeat_offer_comes_from_config() {
        let config = AppConfig {
            heartbeat_outgoing_ms: 0,
            ..AppConfig::default()
        };
        let live = config.live();
        assert!(live.heartbeat.outgoing.is_zero());
        assert_eq!(live.heartbeat.incoming, Duration::from_secs(10));
    }
}
