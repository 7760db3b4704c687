//! In-process gossip substrate for tests and the simulator binary.
//!
//! Not a transport: every callback runs synchronously on the caller's
//! thread. The mesh is an explicit undirected graph, so partial connectivity
//! and partitions are easy to set up.
//!
//! - **Connect**: both ends exchange full state (`gossip` → `on_gossip`).
//! - **Broadcast**: flooded breadth-first along links. Each hop forwards the
//!   delta it returned; a hop returning `None` stops that branch.
//! - **Gossip round**: full-state exchange across every link, the periodic
//!   anti-entropy a real substrate would run.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Weak};

use clustermesh_peer::{Error as PeerError, GossipChannel, Gossiper, Result as PeerResult};
use clustermesh_state::{ClusterInfo, PeerName};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace, warn};

use crate::substrate::Substrate;

/// Counters for traffic delivered through the mesh.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MeshStats {
    /// Full-state deliveries (`on_gossip`).
    pub exchanges: usize,
    /// Broadcast deliveries (`on_gossip_broadcast`).
    pub broadcasts: usize,
    /// Unicast deliveries (`on_gossip_unicast`).
    pub unicasts: usize,
    /// Callbacks that returned an error.
    pub errors: usize,
}

#[derive(Default)]
struct MeshInner {
    nodes: RwLock<HashMap<PeerName, Arc<dyn Gossiper>>>,
    links: RwLock<HashMap<PeerName, BTreeSet<PeerName>>>,
    stats: Mutex<MeshStats>,
}

impl MeshInner {
    fn gossiper(&self, name: PeerName) -> Option<Arc<dyn Gossiper>> {
        self.nodes.read().get(&name).cloned()
    }

    fn neighbors(&self, name: PeerName) -> Vec<PeerName> {
        self.links
            .read()
            .get(&name)
            .map(|n| n.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Send `from`'s full state to `to`.
    fn deliver_full_state(&self, from: PeerName, to: PeerName) {
        let (Some(src), Some(dst)) = (self.gossiper(from), self.gossiper(to)) else {
            return;
        };
        let result = src.gossip().and_then(|buf| dst.on_gossip(&buf));
        let mut stats = self.stats.lock();
        stats.exchanges += 1;
        if let Err(e) = result {
            warn!("Full state {} -> {} failed: {}", from, to, e);
            stats.errors += 1;
        }
    }

    fn exchange(&self, a: PeerName, b: PeerName) {
        self.deliver_full_state(a, b);
        self.deliver_full_state(b, a);
    }

    fn flood(&self, origin: PeerName, payload: Vec<u8>) {
        let mut visited = HashSet::from([origin]);
        let mut queue = VecDeque::from([(origin, payload)]);

        while let Some((src, payload)) = queue.pop_front() {
            for to in self.neighbors(src) {
                if !visited.insert(to) {
                    continue;
                }
                let Some(gossiper) = self.gossiper(to) else {
                    continue;
                };

                let result = gossiper.on_gossip_broadcast(src, &payload);
                let mut stats = self.stats.lock();
                stats.broadcasts += 1;
                match result {
                    Ok(Some(delta)) => queue.push_back((to, delta)),
                    Ok(None) => trace!("Broadcast stops at {}", to),
                    Err(e) => {
                        warn!("Broadcast {} -> {} failed: {}", src, to, e);
                        stats.errors += 1;
                    }
                }
            }
        }
    }

    fn unicast(&self, src: PeerName, dst: PeerName, payload: &[u8]) -> PeerResult<()> {
        let gossiper = self.gossiper(dst).ok_or(PeerError::UnknownPeer(dst))?;
        let result = gossiper.on_gossip_unicast(src, payload);
        let mut stats = self.stats.lock();
        stats.unicasts += 1;
        if result.is_err() {
            stats.errors += 1;
        }
        result
    }
}

/// Outbound channel handed to a node by [`SimulatedMesh`].
struct SimChannel {
    name: PeerName,
    mesh: Weak<MeshInner>,
}

impl GossipChannel for SimChannel {
    fn broadcast(&self, payload: Vec<u8>) {
        if let Some(mesh) = self.mesh.upgrade() {
            mesh.flood(self.name, payload);
        }
    }

    fn unicast(&self, dst: PeerName, payload: Vec<u8>) -> PeerResult<()> {
        let mesh = self.mesh.upgrade().ok_or(PeerError::UnknownPeer(dst))?;
        mesh.unicast(self.name, dst, &payload)
    }
}

/// An in-memory mesh of gossipers.
#[derive(Clone, Default)]
pub struct SimulatedMesh {
    inner: Arc<MeshInner>,
}

impl SimulatedMesh {
    /// Create an empty mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an undirected link without exchanging state.
    pub fn link(&self, a: PeerName, b: PeerName) {
        if a == b {
            return;
        }
        let mut links = self.inner.links.write();
        links.entry(a).or_default().insert(b);
        links.entry(b).or_default().insert(a);
    }

    /// Remove the link between `a` and `b`.
    pub fn unlink(&self, a: PeerName, b: PeerName) {
        let mut links = self.inner.links.write();
        if let Some(n) = links.get_mut(&a) {
            n.remove(&b);
        }
        if let Some(n) = links.get_mut(&b) {
            n.remove(&a);
        }
    }

    /// Current neighbors of `name`.
    pub fn neighbors(&self, name: PeerName) -> Vec<PeerName> {
        self.inner.neighbors(name)
    }

    /// Exchange full state between two nodes.
    pub fn exchange(&self, a: PeerName, b: PeerName) {
        self.inner.exchange(a, b);
    }

    /// Exchange full state across every link once.
    pub fn gossip_round(&self) {
        let pairs: Vec<(PeerName, PeerName)> = {
            let links = self.inner.links.read();
            links
                .iter()
                .flat_map(|(a, ns)| ns.iter().filter(move |b| a < *b).map(move |b| (*a, *b)))
                .collect()
        };
        for (a, b) in pairs {
            self.inner.exchange(a, b);
        }
    }

    /// Every node's current full state, decoded.
    pub fn snapshot(&self) -> HashMap<PeerName, ClusterInfo> {
        let nodes: Vec<_> = self
            .inner
            .nodes
            .read()
            .iter()
            .map(|(n, g)| (*n, Arc::clone(g)))
            .collect();
        nodes
            .into_iter()
            .filter_map(|(name, g)| {
                let info = g.gossip().ok().and_then(|buf| ClusterInfo::decode(&buf).ok())?;
                Some((name, info))
            })
            .collect()
    }

    /// Check if all nodes hold the same value.
    pub fn is_converged(&self) -> bool {
        let snapshot = self.snapshot();
        let mut values = snapshot.values();
        match values.next() {
            Some(first) => values.all(|v| v == first),
            None => true,
        }
    }

    /// Run gossip rounds until all nodes agree.
    ///
    /// Returns the number of rounds run, or `None` if `max_rounds` was not
    /// enough (e.g. the mesh is partitioned).
    pub fn converge(&self, max_rounds: usize) -> Option<usize> {
        for round in 0..=max_rounds {
            if self.is_converged() {
                debug!("Mesh converged after {} rounds", round);
                return Some(round);
            }
            if round < max_rounds {
                self.gossip_round();
            }
        }
        None
    }

    /// Traffic counters so far.
    pub fn stats(&self) -> MeshStats {
        self.inner.stats.lock().clone()
    }
}

impl Substrate for SimulatedMesh {
    fn new_gossip(
        &self,
        channel: &str,
        name: PeerName,
        gossiper: Arc<dyn Gossiper>,
    ) -> Arc<dyn GossipChannel> {
        debug!("Node {} joined channel {}", name, channel);
        self.inner.nodes.write().insert(name, gossiper);
        Arc::new(SimChannel {
            name,
            mesh: Arc::downgrade(&self.inner),
        })
    }

    fn connect(&self, name: PeerName, peers: &[PeerName]) {
        for &peer in peers {
            self.link(name, peer);
            self.inner.exchange(name, peer);
        }
    }
}
