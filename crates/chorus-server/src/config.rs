//! Server configuration.

use chorus_hub::EchoPolicy;
use chorus_settings::ChorusSettings;
use serde::{Deserialize, Serialize};

/// Runtime configuration for the Chorus server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Path accepting the WebSocket upgrade.
    pub ws_path: String,
    /// Upgrades are refused once the hub has this many members.
    pub max_connections: usize,
    /// Max WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Whether senders receive their own messages.
    pub echo: EchoPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            ws_path: "/sock".into(),
            max_connections: 1024,
            max_message_size: 1024 * 1024,
            echo: EchoPolicy::IncludeSender,
        }
    }
}

impl From<&ChorusSettings> for ServerConfig {
    fn from(settings: &ChorusSettings) -> Self {
        Self {
            host: settings.server.host.clone(),
            port: settings.server.port,
            ws_path: settings.server.ws_path.clone(),
            max_connections: settings.server.max_connections,
            max_message_size: settings.server.max_message_size,
            echo: settings.broadcast.echo,
        }
    }
}
