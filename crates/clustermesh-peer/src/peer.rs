//! Peer - binds a node's [`ClusterState`] to the gossip substrate.
//!
//! # Lifecycle
//!
//! 1. [`Peer::spawn`] builds the state and starts the action loop
//! 2. The substrate is given the peer as its [`Gossiper`]
//! 3. [`Peer::register`] hands back the substrate's [`GossipChannel`]
//! 4. [`Peer::stop`] ends the action loop
//!
//! Inbound callbacks do not go through the action loop: they decode first
//! and then take the state's write lock directly, so any number of them can
//! run at once. The loop only serializes locally-originated work.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clustermesh_state::{ClusterInfo, ClusterState, PeerName, RootCertificate};
use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace, warn, Span};

use crate::error::{Error, Result};
use crate::gossip::{GossipChannel, Gossiper};

type Action = Box<dyn FnOnce() + Send>;

/// Shared between the handle and the action loop.
struct PeerInner {
    st: ClusterState,
    send: RwLock<Option<Arc<dyn GossipChannel>>>,
    span: Span,
}

impl PeerInner {
    fn channel(&self) -> Option<Arc<dyn GossipChannel>> {
        self.send.read().clone()
    }

    /// Merge a local change and broadcast whatever it taught us.
    ///
    /// A change peers would refuse to decode is rejected before it is stored.
    fn announce(&self, info: ClusterInfo) -> Result<Option<ClusterInfo>> {
        info.check_payload_size()?;

        let delta = self.st.merge_delta(info);
        if let Some(delta) = delta.as_ref().filter(|d| !d.is_empty()) {
            match self.channel() {
                Some(channel) => {
                    let _entered = self.span.enter();
                    debug!("Broadcasting local change {}", delta);
                    // state is already updated, only the broadcast is lost
                    match delta.encode() {
                        Ok(payload) => channel.broadcast(payload),
                        Err(e) => warn!("Local change not broadcast: {}", e),
                    }
                }
                None => {
                    let _entered = self.span.enter();
                    debug!("No gossip channel yet, local change stays local until next exchange");
                }
            }
        }
        Ok(delta)
    }

    fn send_complete(&self, dst: PeerName) -> Result<()> {
        let channel = self.channel().ok_or(Error::NotRegistered)?;
        channel.unicast(dst, self.st.encode()?)
    }
}

/// A mesh participant holding cluster state.
///
/// Implements [`Gossiper`]; hand an `Arc<Peer>` to the substrate.
pub struct Peer {
    inner: Arc<PeerInner>,
    actions: mpsc::UnboundedSender<Action>,
    quit: Mutex<Option<oneshot::Sender<()>>>,
    stopped: AtomicBool,
}

impl Peer {
    /// Build a peer from local knowledge and start its action loop.
    ///
    /// Must be called from within a tokio runtime. Register a channel
    /// afterwards so local changes can go out.
    pub fn spawn<I>(
        name: PeerName,
        root_certificate: Option<RootCertificate>,
        apiservers: I,
        span: Span,
    ) -> Arc<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let st = ClusterState::new(name, root_certificate, apiservers, span.clone());
        let (actions, actions_rx) = mpsc::unbounded_channel();
        let (quit, quit_rx) = oneshot::channel();

        tokio::spawn(run_actions(actions_rx, quit_rx, span.clone()));

        Arc::new(Self {
            inner: Arc::new(PeerInner {
                st,
                send: RwLock::new(None),
                span,
            }),
            actions,
            quit: Mutex::new(Some(quit)),
            stopped: AtomicBool::new(false),
        })
    }

    /// This node's name.
    pub fn name(&self) -> PeerName {
        self.inner.st.name()
    }

    /// The underlying state.
    pub fn state(&self) -> &ClusterState {
        &self.inner.st
    }

    /// Register the outbound channel returned by the substrate.
    pub async fn register(&self, channel: Arc<dyn GossipChannel>) -> Result<()> {
        let inner = Arc::clone(&self.inner);
        self.call(move || {
            *inner.send.write() = Some(channel);
        })
        .await
    }

    /// Apply a locally originated change and broadcast what is new.
    ///
    /// Returns the delta, or `None` if `info` was empty.
    pub async fn announce(&self, info: ClusterInfo) -> Result<Option<ClusterInfo>> {
        let inner = Arc::clone(&self.inner);
        self.call(move || inner.announce(info)).await?
    }

    /// Send our complete state to one peer.
    pub async fn send_complete(&self, dst: PeerName) -> Result<()> {
        let inner = Arc::clone(&self.inner);
        self.call(move || inner.send_complete(dst)).await?
    }

    /// Stop the action loop. In-flight merges still complete.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        if let Some(quit) = self.quit.lock().take() {
            let _ = quit.send(());
        }
    }

    /// Check if [`stop`](Self::stop) has been called.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Run `f` on the action loop and wait for its result.
    async fn call<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        if self.is_stopped() {
            return Err(Error::Stopped);
        }
        let (tx, rx) = oneshot::channel();
        self.actions
            .send(Box::new(move || {
                let _ = tx.send(f());
            }))
            .map_err(|_| Error::Stopped)?;
        rx.await.map_err(|_| Error::Stopped)
    }
}

impl Drop for Peer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_actions(
    mut actions: mpsc::UnboundedReceiver<Action>,
    mut quit: oneshot::Receiver<()>,
    span: Span,
) {
    loop {
        tokio::select! {
            Some(action) = actions.recv() => action(),
            _ = &mut quit => break,
        }
    }
    span.in_scope(|| debug!("Action loop stopped"));
}

impl Gossiper for Peer {
    fn gossip(&self) -> Result<Vec<u8>> {
        let complete = self.inner.st.copy();
        let _entered = self.inner.span.enter();
        trace!("Gossip => complete {}", complete);
        Ok(complete.encode()?)
    }

    fn on_gossip(&self, buf: &[u8]) -> Result<Option<Vec<u8>>> {
        let _entered = self.inner.span.enter();
        let info = ClusterInfo::decode(buf).map_err(|e| {
            warn!("OnGossip: {}", e);
            e
        })?;

        let received = self.inner.st.merge_received(info);
        debug!("OnGossip => received {}", received);
        Ok(Some(received.encode()?))
    }

    fn on_gossip_broadcast(&self, src: PeerName, buf: &[u8]) -> Result<Option<Vec<u8>>> {
        let _entered = self.inner.span.enter();
        let info = ClusterInfo::decode(buf).map_err(|e| {
            warn!("OnGossipBroadcast from {}: {}", src, e);
            e
        })?;

        match self.inner.st.merge_delta(info).filter(|d| !d.is_empty()) {
            Some(delta) => {
                debug!("OnGossipBroadcast {} => delta {}", src, delta);
                Ok(Some(delta.encode()?))
            }
            None => {
                debug!("OnGossipBroadcast {} => no delta", src);
                Ok(None)
            }
        }
    }

    fn on_gossip_unicast(&self, src: PeerName, buf: &[u8]) -> Result<()> {
        let _entered = self.inner.span.enter();
        let info = ClusterInfo::decode(buf).map_err(|e| {
            warn!("OnGossipUnicast from {}: {}", src, e);
            e
        })?;

        let complete = self.inner.st.merge_complete(info);
        debug!("OnGossipUnicast {} => complete {}", src, complete);
        Ok(())
    }
}
