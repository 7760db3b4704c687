//! The substrate seam a node is started against.

use std::sync::Arc;

use clustermesh_peer::{GossipChannel, Gossiper};
use clustermesh_state::PeerName;

/// What a node needs from its gossip substrate at startup.
///
/// A real substrate owns sockets, peer discovery and retries; none of that
/// is visible here.
pub trait Substrate: Send + Sync {
    /// Attach `gossiper` to `channel` for node `name` and return the outbound
    /// half of the channel.
    fn new_gossip(
        &self,
        channel: &str,
        name: PeerName,
        gossiper: Arc<dyn Gossiper>,
    ) -> Arc<dyn GossipChannel>;

    /// Start connecting `name` to its initial peers.
    fn connect(&self, name: PeerName, peers: &[PeerName]);
}
