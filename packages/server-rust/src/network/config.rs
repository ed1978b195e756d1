//! Gateway configuration.

use std::time::Duration;

/// Listener and HTTP stack settings.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Bind address.
    pub host: String,
    /// Port to listen on. 0 means OS-assigned.
    pub port: u16,
    /// Allowed CORS origins. `"*"` allows any.
    pub cors_origins: Vec<String>,
    /// Maximum time to wait for a request to complete.
    pub request_timeout: Duration,
    /// Largest accepted request body, image uploads included.
    pub max_body_bytes: usize,
    /// How long shutdown waits for in-flight requests.
    pub drain_timeout: Duration,
    /// Per-connection feed settings.
    pub feed: FeedConfig,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 0,
            cors_origins: vec!["*".to_string()],
            request_timeout: Duration::from_secs(30),
            max_body_bytes: 5 * 1024 * 1024,
            drain_timeout: Duration::from_secs(10),
            feed: FeedConfig::default(),
        }
    }
}

/// Settings for `/users/feed` `WebSocket` connections.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Maximum time to wait when sending one frame to a client.
    pub send_timeout: Duration,
    /// `WebSocket` write buffer size in bytes.
    pub ws_write_buffer_size: usize,
    /// Maximum `WebSocket` write buffer size in bytes.
    pub ws_max_write_buffer_size: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            send_timeout: Duration::from_secs(5),
            ws_write_buffer_size: 131_072,     // 128 KB
            ws_max_write_buffer_size: 524_288, // 512 KB
        }
    }
}
