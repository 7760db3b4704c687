//! Node configuration.

use std::path::PathBuf;

use clustermesh_state::PeerName;

use crate::error::{Error, Result};

/// Default gossip channel name.
pub const DEFAULT_CHANNEL: &str = "default";

/// Configuration for a clustermesh node.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Mesh peer ID (MAC-style).
    pub peer_name: PeerName,

    /// Human-readable name used in log output.
    pub nickname: String,

    /// Root CA certificate file, if this node has one.
    pub root_ca: Option<PathBuf>,

    /// Explicit `not_before` for the root CA (Unix millis).
    /// Defaults to the file's modification time.
    pub root_ca_not_before: Option<u64>,

    /// API-server URLs this node knows about at startup.
    pub apiserver_urls: Vec<String>,

    /// Initial peers.
    pub peers: Vec<PeerName>,

    /// Gossip channel name.
    pub channel: String,
}

impl NodeConfig {
    /// Create a config with nothing but a peer name.
    pub fn new(peer_name: PeerName) -> Self {
        Self {
            peer_name,
            nickname: "clustermesh".to_string(),
            root_ca: None,
            root_ca_not_before: None,
            apiserver_urls: Vec::new(),
            peers: Vec::new(),
            channel: DEFAULT_CHANNEL.to_string(),
        }
    }

    /// Create config from environment variables.
    ///
    /// `CLUSTERMESH_PEER_NAME` is required; everything else has a default.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from an arbitrary key lookup (environment-shaped).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let peer_name = lookup("CLUSTERMESH_PEER_NAME")
            .ok_or_else(|| Error::Config("CLUSTERMESH_PEER_NAME is not set".to_string()))?
            .parse::<PeerName>()?;

        let nickname = lookup("CLUSTERMESH_NICKNAME")
            .or_else(|| lookup("HOSTNAME"))
            .unwrap_or_else(|| "clustermesh".to_string());

        let root_ca = lookup("CLUSTERMESH_ROOT_CA")
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);

        let root_ca_not_before = lookup("CLUSTERMESH_ROOT_CA_NOT_BEFORE")
            .map(|s| {
                s.trim().parse::<u64>().map_err(|_| {
                    Error::Config(format!("Invalid CLUSTERMESH_ROOT_CA_NOT_BEFORE: {s}"))
                })
            })
            .transpose()?;

        let apiserver_urls = lookup("CLUSTERMESH_APISERVER_URLS")
            .map(|s| split_list(&s))
            .unwrap_or_default();

        let peers = lookup("CLUSTERMESH_PEERS")
            .map(|s| {
                split_list(&s)
                    .iter()
                    .map(|p| p.parse::<PeerName>())
                    .collect::<std::result::Result<Vec<_>, _>>()
            })
            .transpose()?
            .unwrap_or_default();

        let channel = lookup("CLUSTERMESH_CHANNEL")
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_CHANNEL.to_string());

        Ok(Self {
            peer_name,
            nickname,
            root_ca,
            root_ca_not_before,
            apiserver_urls,
            peers,
            channel,
        })
    }

    /// Set the nickname.
    #[must_use]
    pub fn with_nickname(mut self, nickname: impl Into<String>) -> Self {
        self.nickname = nickname.into();
        self
    }

    /// Set the root CA file and, optionally, its `not_before`.
    #[must_use]
    pub fn with_root_ca(mut self, path: impl Into<PathBuf>, not_before: Option<u64>) -> Self {
        self.root_ca = Some(path.into());
        self.root_ca_not_before = not_before;
        self
    }

    /// Add an API-server URL.
    #[must_use]
    pub fn with_apiserver_url(mut self, url: impl Into<String>) -> Self {
        self.apiserver_urls.push(url.into());
        self
    }

    /// Add an initial peer.
    #[must_use]
    pub fn with_peer(mut self, peer: PeerName) -> Self {
        self.peers.push(peer);
        self
    }

    /// Set the gossip channel name.
    #[must_use]
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }
}

fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}
