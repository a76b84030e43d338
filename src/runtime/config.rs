//! Node configuration, loaded from TOML.
//!
//! ```toml
//! [process]
//! id = "00000000000000a1"
//! app_name = "cav"
//! listen = "127.0.0.1:8080"
//! applications = ["cav"]
//! metadata = { supportsCalculators = "true" }
//!
//! [world]
//! query_timeout_ms = 30000
//! sweep_interval_ms = 1000
//!
//! [transport]
//! resolve_attempts = 10
//! resolve_retry_delay_ms = 1000
//! request_timeout_ms = 10000
//!
//! [[peers]]
//! id = "00000000000000b2"
//! app_name = "cav"
//! url = "http://127.0.0.1:8081"
//! ```
//!
//! Every field is optional.

use crate::framework::{ProcessInfo, WorldConfig};
use crate::transport::TransportConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::Path;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid process id {0:?}, expected up to 16 hex digits")]
    InvalidProcessId(String),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshConfig {
    pub process: ProcessConfig,
    pub world: WorldConfig,
    pub transport: TransportConfig,
    pub peers: Vec<PeerConfig>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessConfig {
    /// Hex process id; a random one is drawn when absent.
    pub id: Option<String>,
    pub app_name: String,
    pub listen: SocketAddr,
    /// Applications whose processes this node talks to. Empty means its own only.
    pub applications: Vec<String>,
    pub metadata: BTreeMap<String, String>,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            id: None,
            app_name: "mesh".to_string(),
            listen: SocketAddr::from(([127, 0, 0, 1], 0)),
            applications: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PeerConfig {
    pub id: String,
    #[serde(default)]
    pub app_name: Option<String>,
    pub url: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

fn parse_process_id(id: &str) -> Result<u64, ConfigError> {
    if id.is_empty() || id.len() > 16 || !id.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(ConfigError::InvalidProcessId(id.to_string()));
    }
    u64::from_str_radix(id, 16).map_err(|_| ConfigError::InvalidProcessId(id.to_string()))
}

impl MeshConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml(&text)?;
        info!(path = %path.display(), peers = config.peers.len(), "Configuration loaded");
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Identity of the local process. Draws a random id when none is configured.
    pub fn process_info(&self) -> Result<ProcessInfo, ConfigError> {
        let id = match &self.process.id {
            Some(id) => parse_process_id(id)?,
            None => rand::random::<u64>(),
        };
        let mut process = ProcessInfo::new(id, self.process.app_name.clone());
        process
            .metadata_mut()
            .extend(self.process.metadata.clone());
        Ok(process)
    }

    /// The configured peers as registry entries. Peers without application inherit ours.
    pub fn peer_infos(&self) -> Result<Vec<ProcessInfo>, ConfigError> {
        self.peers
            .iter()
            .map(|peer| {
                let app_name = peer
                    .app_name
                    .clone()
                    .unwrap_or_else(|| self.process.app_name.clone());
                let mut process =
                    ProcessInfo::new(parse_process_id(&peer.id)?, app_name).with_url(&peer.url);
                process.metadata_mut().extend(peer.metadata.clone());
                Ok(process)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_config_uses_defaults() {
        let config = MeshConfig::from_toml("").unwrap();
        assert_eq!(config, MeshConfig::default());
        assert_eq!(config.world.query_timeout_ms, 30_000);
        assert_eq!(config.transport.resolve_attempts, 10);
        assert!(config.process_info().is_ok());
    }

    #[test]
    fn parses_a_full_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
            [process]
            id = "a1"
            app_name = "cav"
            listen = "127.0.0.1:9000"
            metadata = {{ supportsCalculators = "true" }}

            [world]
            query_timeout_ms = 500

            [[peers]]
            id = "b2"
            url = "http://127.0.0.1:9001"
            "#
        )
        .unwrap();

        let config = MeshConfig::load(file.path()).unwrap();
        assert_eq!(config.world.query_timeout_ms, 500);
        assert_eq!(config.world.sweep_interval_ms, 1_000);
        assert_eq!(config.process.listen.port(), 9000);

        let process = config.process_info().unwrap();
        assert_eq!(process.id(), 0xa1);
        assert!(process.has_capability("supportsCalculators"));

        let peers = config.peer_infos().unwrap();
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].id(), 0xb2);
        assert_eq!(peers[0].app_name(), "cav");
        assert_eq!(peers[0].url(), Some("http://127.0.0.1:9001"));
    }

    #[test]
    fn rejects_bad_process_ids() {
        let config = MeshConfig::from_toml("[process]\nid = \"not-hex\"").unwrap();
        assert!(matches!(
            config.process_info(),
            Err(ConfigError::InvalidProcessId(_))
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        assert!(matches!(
            MeshConfig::load("/definitely/not/here.toml"),
            Err(ConfigError::Io { .. })
        ));
    }
}
