//! Clustermesh State - convergent cluster configuration
//!
//! Every node in a clustermesh holds a small piece of shared configuration:
//! a trusted root certificate and the set of API-server URLs. Nodes gossip
//! this value to each other and merge whatever they receive. The merge is
//! commutative, associative and idempotent, so every node that has directly
//! or transitively heard from another ends up with the same value, no matter
//! the order or the number of times updates arrive.
//!
//! # Conflict Resolution
//!
//! - **Root certificate**: last-writer-wins on `not_before`. Equal timestamps
//!   are broken by the greater signature (lexicographic byte order), so two
//!   nodes comparing the same candidates always pick the same winner.
//! - **API-server URLs**: set union. The delta re-broadcast to other peers is
//!   only the newly learned URLs, never the whole set.
//!
//! # Layout
//!
//! - [`ClusterInfo`] / [`RootCertificate`]: the gossiped value.
//! - [`merge()`]: the pure merge engine.
//! - [`ClusterState`]: the lock-guarded authoritative value of one node.

mod error;
mod info;
mod merge;
mod name;
mod state;

pub use error::{Error, Result};
pub use info::{ClusterInfo, RootCertificate, MAX_PAYLOAD_BYTES};
pub use merge::{merge, should_use_their_root_certificate, Merged};
pub use name::PeerName;
pub use state::ClusterState;
