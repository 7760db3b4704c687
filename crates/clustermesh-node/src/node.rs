//! Clustermesh Node - wires local inputs, a [`Peer`] and a substrate together.
//!
//! Startup order:
//! 1. Load the local root CA (if configured)
//! 2. Spawn the peer with local knowledge
//! 3. Attach it to the substrate's gossip channel and register the channel
//! 4. Connect to initial peers

use std::sync::Arc;

use clustermesh_peer::{Gossiper, Peer};
use clustermesh_state::{ClusterInfo, PeerName, RootCertificate};
use tracing::{info, info_span, Span};

use crate::certificate::load_root_certificate;
use crate::config::NodeConfig;
use crate::error::Result;
use crate::substrate::Substrate;

/// A running clustermesh node.
pub struct Node {
    peer: Arc<Peer>,
    config: NodeConfig,
    span: Span,
}

impl Node {
    /// Start a node, loading the root CA from `config.root_ca` if set.
    pub async fn start(config: NodeConfig, substrate: &dyn Substrate) -> Result<Self> {
        let certificate = match &config.root_ca {
            Some(path) => Some(load_root_certificate(path, config.root_ca_not_before)?),
            None => None,
        };
        Self::start_with_certificate(config, certificate, substrate).await
    }

    /// Start a node with an already-built root certificate.
    pub async fn start_with_certificate(
        config: NodeConfig,
        certificate: Option<RootCertificate>,
        substrate: &dyn Substrate,
    ) -> Result<Self> {
        let span = info_span!("node", name = %config.peer_name, nickname = %config.nickname);

        let peer = Peer::spawn(
            config.peer_name,
            certificate,
            config.apiserver_urls.clone(),
            span.clone(),
        );

        let gossiper: Arc<dyn Gossiper> = peer.clone();
        let channel = substrate.new_gossip(&config.channel, config.peer_name, gossiper);
        peer.register(channel).await?;

        span.in_scope(|| {
            info!("Mesh node started on channel {:?}", config.channel);
            if !config.peers.is_empty() {
                info!("Connecting to {} initial peers", config.peers.len());
            }
        });
        substrate.connect(config.peer_name, &config.peers);

        Ok(Self { peer, config, span })
    }

    /// This node's name.
    pub fn name(&self) -> PeerName {
        self.peer.name()
    }

    /// The node's configuration.
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// The node's peer.
    pub fn peer(&self) -> &Arc<Peer> {
        &self.peer
    }

    /// Snapshot of the node's current cluster view.
    pub fn cluster_info(&self) -> ClusterInfo {
        self.peer.state().copy()
    }

    /// Learn a new API-server URL locally and gossip it.
    pub async fn add_apiserver_url(&self, url: impl Into<String>) -> Result<Option<ClusterInfo>> {
        Ok(self
            .peer
            .announce(ClusterInfo::default().with_url(url))
            .await?)
    }

    /// Install a root certificate locally and gossip it if it wins.
    pub async fn set_root_certificate(
        &self,
        certificate: RootCertificate,
    ) -> Result<Option<ClusterInfo>> {
        Ok(self
            .peer
            .announce(ClusterInfo::default().with_root_certificate(certificate))
            .await?)
    }

    /// Stop the node's action loop.
    pub fn stop(&self) {
        self.span.in_scope(|| info!("Mesh node stopping"));
        self.peer.stop();
    }
}
