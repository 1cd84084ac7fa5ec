// Relay and client configuration.
//
// Plain structs with `Default`, so library callers and tests build them with
// struct update syntax. Both binaries can also load them from a JSON file;
// every field is `#[serde(default)]`, so a file only needs the keys it
// changes. Command-line flags are applied on top of the file.

use std::fs;
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use std::time::Duration;

use kidpaint_canvas::CanvasConfig;
use kidpaint_protocol::discovery::{BROADCAST_ADDRESS, DEFAULT_DISPLAY_NAME, DISCOVERY_PORT};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::RelayError;

/// Configuration for starting a relay.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Address both the TCP listener and the discovery responder bind to.
    pub bind_address: IpAddr,
    /// TCP session port (0 lets the OS pick).
    pub port: u16,
    /// UDP discovery port; `None` runs without a discovery responder.
    pub discovery_port: Option<u16>,
    /// Canonical grid width in cells.
    pub width: u32,
    /// Canonical grid height in cells.
    pub height: u32,
    /// Connections beyond this many live participants are refused.
    pub max_participants: u32,
    /// A participant whose socket accepts no data for this long is dropped.
    pub write_timeout_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 7878,
            discovery_port: Some(DISCOVERY_PORT),
            width: 50,
            height: 50,
            max_participants: 32,
            write_timeout_ms: 5000,
        }
    }
}

impl RelayConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, RelayError> {
        load_json(path)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms.max(1))
    }
}

/// Where and how long a client looks for a relay.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Destination of the request datagram.
    pub broadcast_address: IpAddr,
    pub port: u16,
    /// How long each attempt waits for a response.
    pub timeout_ms: u64,
    /// How many times the request is sent before giving up.
    pub attempts: u32,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            broadcast_address: IpAddr::V4(BROADCAST_ADDRESS),
            port: DISCOVERY_PORT,
            timeout_ms: 2000,
            attempts: 3,
        }
    }
}

impl DiscoveryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Everything a canvas client needs to join a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Display name, sent in discovery and prefixed to chat lines.
    pub name: String,
    pub discovery: DiscoveryConfig,
    /// Must match the relay's grid size; snapshot and peer edits outside the
    /// local grid are ignored.
    pub canvas: CanvasConfig,
    /// Re-send the cells an undo/redo changed so peers converge on the
    /// restored picture. When false, undo/redo only change the local view.
    pub broadcast_history: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_DISPLAY_NAME.into(),
            discovery: DiscoveryConfig::default(),
            canvas: CanvasConfig::default(),
            broadcast_history: true,
        }
    }
}

impl ClientConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, RelayError> {
        load_json(path)
    }
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, RelayError> {
    let bytes = fs::read(path).map_err(|source| RelayError::ConfigIo {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| RelayError::ConfigParse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relay_config_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.json");
        fs::write(
            &path,
            r#"{"port": 9000, "discovery_port": null, "bind_address": "127.0.0.1"}"#,
        )
        .unwrap();

        let config = RelayConfig::from_json_file(&path).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.discovery_port, None);
        assert_eq!(config.bind_address, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(config.width, 50);
        assert_eq!(config.max_participants, 32);
        assert_eq!(config.write_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn client_config_nested_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.json");
        fs::write(
            &path,
            r#"{"name": "Ada", "discovery": {"timeout_ms": 250}, "canvas": {"width": 20, "height": 10}}"#,
        )
        .unwrap();

        let config = ClientConfig::from_json_file(&path).unwrap();
        assert_eq!(config.name, "Ada");
        assert_eq!(config.discovery.timeout(), Duration::from_millis(250));
        assert_eq!(config.discovery.port, DISCOVERY_PORT);
        assert_eq!(config.canvas.width, 20);
        assert!(config.broadcast_history);
    }

    #[test]
    fn missing_file_and_bad_json_are_distinguished() {
        let dir = tempfile::tempdir().unwrap();
        let missing = RelayConfig::from_json_file(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(missing, RelayError::ConfigIo { .. }));

        let path = dir.path().join("bad.json");
        fs::write(&path, "{ port: ").unwrap();
        let bad = RelayConfig::from_json_file(&path).unwrap_err();
        assert!(matches!(bad, RelayError::ConfigParse { .. }));
    }
}
