//! Clustermesh Peer - the gossip-facing side of a node
//!
//! A gossip substrate (transport, discovery, topology) drives a node through
//! four callbacks, collected in the [`Gossiper`] trait:
//!
//! | Callback | State operation | Returns |
//! |---|---|---|
//! | [`gossip`](Gossiper::gossip) | `copy` + encode | full state |
//! | [`on_gossip`](Gossiper::on_gossip) | `merge_received` | what we were told |
//! | [`on_gossip_broadcast`](Gossiper::on_gossip_broadcast) | `merge_delta` | delta to propagate |
//! | [`on_gossip_unicast`](Gossiper::on_gossip_unicast) | `merge_complete` | nothing |
//!
//! [`Peer`] implements it on top of a [`ClusterState`](clustermesh_state::ClusterState).
//! Payloads are decoded before any lock is taken, so a malformed payload
//! fails with [`Error::State`] and leaves the state untouched.

pub mod error;
pub mod gossip;
pub mod peer;

pub use clustermesh_state::{ClusterInfo, PeerName, RootCertificate};
pub use error::{Error, Result};
pub use gossip::{GossipChannel, Gossiper};
pub use peer::Peer;
