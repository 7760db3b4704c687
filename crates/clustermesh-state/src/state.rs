//! Authoritative per-node state.

use parking_lot::RwLock;
use tracing::{debug, info, trace, Span};

use crate::error::Result;
use crate::info::{ClusterInfo, RootCertificate};
use crate::merge::merge;
use crate::name::PeerName;

/// The node's current best-known [`ClusterInfo`].
///
/// One instance per node. Reads take the read lock, the three merges take
/// the write lock for the in-memory merge only. Callers decode before
/// calling in, so a bad payload never reaches the lock.
#[derive(Debug)]
pub struct ClusterState {
    name: PeerName,
    info: RwLock<ClusterInfo>,
    span: Span,
}

impl ClusterState {
    /// Create state from what this node knows locally.
    ///
    /// `span` identifies the node in log output; pass `Span::none()` to stay
    /// silent.
    pub fn new<I>(
        name: PeerName,
        root_certificate: Option<RootCertificate>,
        apiserver_urls: I,
        span: Span,
    ) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let info = ClusterInfo::new(root_certificate, apiserver_urls);
        span.in_scope(|| match &info.root_certificate {
            Some(cert) => info!(
                "I have a root CA which is not valid before {}",
                cert.not_before
            ),
            None => info!("No local root CA, waiting for peers"),
        });

        Self {
            name,
            info: RwLock::new(info),
            span,
        }
    }

    /// This node's name.
    pub fn name(&self) -> PeerName {
        self.name
    }

    /// Snapshot of the current value.
    pub fn copy(&self) -> ClusterInfo {
        self.info.read().clone()
    }

    /// Serialize the current value for the wire.
    pub fn encode(&self) -> Result<Vec<u8>> {
        self.info.read().encode()
    }

    /// Merge a peer's full state received during the initial exchange.
    ///
    /// Returns what we were told, for diagnostics. Not meant for
    /// re-propagation.
    pub fn merge_received(&self, incoming: ClusterInfo) -> ClusterInfo {
        let _entered = self.span.enter();
        let mut current = self.info.write();
        let merged = merge(&incoming, &current);
        *current = merged.result;
        drop(current);

        trace!("merge_received {}", incoming);
        incoming
    }

    /// Merge an incremental broadcast.
    ///
    /// Returns `None` when `incoming` was empty, signalling there is nothing
    /// to re-gossip. Otherwise returns the delta for further fan-out.
    pub fn merge_delta(&self, incoming: ClusterInfo) -> Option<ClusterInfo> {
        let _entered = self.span.enter();
        let mut current = self.info.write();
        let merged = merge(&current, &incoming);
        *current = merged.result;
        drop(current);

        if incoming.is_empty() {
            trace!("merge_delta: empty update");
            return None;
        }
        if let Some(cert) = &merged.delta.root_certificate {
            debug!("Adopted {}", cert);
        }
        trace!("merge_delta {} => delta {}", incoming, merged.delta);
        Some(merged.delta)
    }

    /// Merge a direct update and return the complete merged view.
    pub fn merge_complete(&self, incoming: ClusterInfo) -> ClusterInfo {
        let _entered = self.span.enter();
        let mut current = self.info.write();
        let merged = merge(&current, &incoming);
        *current = merged.result;
        let complete = current.clone();
        drop(current);

        if let Some(cert) = &merged.delta.root_certificate {
            debug!("Adopted {}", cert);
        }
        trace!("merge_complete {} => complete {}", incoming, complete);
        complete
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cert(not_before: u64, sig: &[u8]) -> RootCertificate {
        RootCertificate::new(b"payload".to_vec(), not_before, sig.to_vec())
    }

    fn state(cert: Option<RootCertificate>, urls: &[&str]) -> ClusterState {
        ClusterState::new(
            PeerName::from_u64(1),
            cert,
            urls.iter().map(|u| u.to_string()),
            Span::none(),
        )
    }

    #[test]
    fn new_state_holds_local_knowledge() {
        let st = state(Some(cert(10, b"s")), &["http://a"]);
        let snapshot = st.copy();
        assert_eq!(snapshot.not_before(), Some(10));
        assert!(snapshot.apiserver_urls.contains("http://a"));
        assert_eq!(st.name(), PeerName::from_u64(1));
    }

    #[test]
    fn merge_received_returns_incoming_and_stores_union() {
        let st = state(Some(cert(10, b"s")), &["http://a"]);
        let incoming = ClusterInfo::new(Some(cert(5, b"t")), ["http://b"]);

        let received = st.merge_received(incoming.clone());

        assert_eq!(received, incoming);
        let now = st.copy();
        assert_eq!(now.not_before(), Some(10));
        assert_eq!(now.apiserver_urls.len(), 2);
    }

    #[test]
    fn merge_delta_returns_only_new_urls() {
        let st = state(None, &["http://a"]);

        let delta = st
            .merge_delta(ClusterInfo::new(None, ["http://a", "http://b"]))
            .unwrap();

        assert_eq!(delta, ClusterInfo::new(None, ["http://b"]));
        assert_eq!(st.copy(), ClusterInfo::new(None, ["http://a", "http://b"]));
    }

    #[test]
    fn merge_delta_on_empty_incoming_returns_none() {
        let st = state(Some(cert(1, b"a")), &["http://a"]);
        let before = st.copy();

        assert!(st.merge_delta(ClusterInfo::default()).is_none());
        assert_eq!(st.copy(), before);
    }

    #[test]
    fn merge_delta_with_nothing_new_returns_empty_delta() {
        let st = state(None, &["http://a"]);
        let delta = st.merge_delta(ClusterInfo::new(None, ["http://a"])).unwrap();
        assert!(delta.is_empty());
    }

    #[test]
    fn merge_delta_is_monotonic() {
        let st = state(Some(cert(100, b"m")), &["http://a", "http://b"]);
        let before = st.copy();

        st.merge_delta(ClusterInfo::new(Some(cert(50, b"zz")), ["http://c"]));

        let after = st.copy();
        assert!(after.apiserver_urls.is_superset(&before.apiserver_urls));
        assert!(after.not_before() >= before.not_before());
    }

    #[test]
    fn merge_complete_returns_full_view() {
        let st = state(None, &["http://a"]);
        let complete = st.merge_complete(ClusterInfo::new(Some(cert(3, b"x")), ["http://b"]));

        assert_eq!(complete, st.copy());
        assert_eq!(complete.not_before(), Some(3));
        assert_eq!(complete.apiserver_urls.len(), 2);
    }

    #[test]
    fn snapshots_are_unaffected_by_later_merges() {
        let st = state(Some(cert(1, b"a")), &[]);
        let snapshot = st.copy();

        st.merge_complete(ClusterInfo::new(Some(cert(2, b"b")), ["http://z"]));

        assert_eq!(snapshot.not_before(), Some(1));
        assert!(snapshot.apiserver_urls.is_empty());
    }

    #[test]
    fn encode_matches_snapshot() {
        let st = state(Some(cert(1, b"a")), &["http://a"]);
        let decoded = ClusterInfo::decode(&st.encode().unwrap()).unwrap();
        assert_eq!(decoded, st.copy());
    }

    #[test]
    fn concurrent_merges_converge() {
        use std::sync::Arc;
        use std::thread;

        let st = Arc::new(state(None, &[]));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let st = Arc::clone(&st);
                thread::spawn(move || {
                    for j in 0..50 {
                        let url = format!("http://node-{i}-{j}");
                        st.merge_delta(ClusterInfo::new(Some(cert(j, &[i as u8])), [url]));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let info = st.copy();
        assert_eq!(info.apiserver_urls.len(), 8 * 50);
        // highest not_before, greatest signature
        assert_eq!(info.root_certificate.unwrap().signature, vec![7u8]);
        assert_eq!(st.copy().not_before(), Some(49));
    }
}
