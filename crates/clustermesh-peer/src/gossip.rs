//! The contract between a node and its gossip substrate.
//!
//! The substrate owns transport, discovery and topology. It calls a
//! [`Gossiper`] when traffic arrives and hands the node a [`GossipChannel`]
//! for outbound traffic.

use clustermesh_state::PeerName;

use crate::error::Result;

/// Callbacks the substrate invokes. Implementations must tolerate concurrent
/// calls for different peers.
pub trait Gossiper: Send + Sync {
    /// This node's complete state, e.g. for a newly connected peer.
    fn gossip(&self) -> Result<Vec<u8>>;

    /// Merge a peer's complete state.
    fn on_gossip(&self, buf: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Merge a broadcast delta. `Some` is the non-empty delta to propagate
    /// further, `None` ends propagation at this node.
    fn on_gossip_broadcast(&self, src: PeerName, buf: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Merge a point-to-point update. Nothing propagates.
    fn on_gossip_unicast(&self, src: PeerName, buf: &[u8]) -> Result<()>;
}

/// Outbound half of a gossip channel, handed out by the substrate.
pub trait GossipChannel: Send + Sync {
    /// Send to all peers along the gossip topology.
    fn broadcast(&self, payload: Vec<u8>);

    /// Send to a single peer.
    fn unicast(&self, dst: PeerName, payload: Vec<u8>) -> Result<()>;
}
