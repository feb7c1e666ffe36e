//! In-process channel connecting any number of nodes.
//!
//! Used by the demo host and by tests. Records live in one shared store with
//! last-write-wins per path. Urgent records are fanned out to every connected
//! node's listeners immediately; other records after `batch_delay`. Faults
//! (refused connections, failing sends, connect latency) can be injected.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use sunlink_core::{ChannelError, TransportConfig};

use crate::channel::{Channel, ListenerId, MessageListener, RecordListener};
use crate::data::{
    MessageEvent, PeerId, PutRecordRequest, Record, RecordEvent, RecordEventKind,
};

#[derive(Debug, Clone)]
pub struct LoopbackConfig {
    /// Delay before non-urgent records reach listeners.
    pub batch_delay: Duration,
    /// Simulated time a connection attempt takes.
    pub connect_latency: Duration,
}

impl Default for LoopbackConfig {
    fn default() -> Self {
        Self {
            batch_delay: Duration::from_secs(30),
            connect_latency: Duration::ZERO,
        }
    }
}

impl From<&TransportConfig> for LoopbackConfig {
    fn from(config: &TransportConfig) -> Self {
        Self {
            batch_delay: Duration::from_millis(config.batch_delay_ms),
            ..Self::default()
        }
    }
}

/// Per-node counters for tests and diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeStats {
    pub connects: u32,
    pub records_put: u32,
    pub messages_received: u32,
}

#[derive(Default)]
struct NodeState {
    connected: bool,
    refuse_connect: bool,
    send_failure: Option<i32>,
    record_listeners: Vec<(ListenerId, RecordListener)>,
    message_listeners: Vec<(ListenerId, MessageListener)>,
    stats: NodeStats,
}

#[derive(Default)]
struct NetworkState {
    records: BTreeMap<String, Record>,
    nodes: HashMap<PeerId, NodeState>,
    next_listener: u64,
    next_sequence: u64,
}

impl NetworkState {
    fn node_mut(&mut self, peer: &PeerId) -> &mut NodeState {
        self.nodes.entry(peer.clone()).or_default()
    }

    fn is_connected(&self, peer: &PeerId) -> bool {
        self.nodes.get(peer).is_some_and(|n| n.connected)
    }

    fn next_listener_id(&mut self) -> ListenerId {
        self.next_listener += 1;
        ListenerId(self.next_listener)
    }

    /// Deliver `events` to every connected node, pruning listeners whose receiver is gone.
    fn fan_out(&mut self, events: &[RecordEvent]) {
        for (peer, node) in self.nodes.iter_mut().filter(|(_, n)| n.connected) {
            node.record_listeners.retain(|(id, listener)| {
                let delivered = listener.send(events.to_vec()).is_ok();
                if !delivered {
                    tracing::debug!("Dropping closed record listener {:?} on {}", id, peer);
                }
                delivered
            });
        }
    }
}

/// Shared medium all loopback nodes attach to.
#[derive(Clone, Default)]
pub struct LoopbackNetwork {
    state: Arc<Mutex<NetworkState>>,
    config: LoopbackConfig,
}

impl LoopbackNetwork {
    pub fn new(config: LoopbackConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(NetworkState::default())),
            config,
        }
    }

    /// Attach a node with the given id (or get a second handle to an existing one).
    pub fn node(&self, id: &str) -> Arc<LoopbackChannel> {
        let peer = PeerId::new(id);
        self.state.lock().node_mut(&peer);
        Arc::new(LoopbackChannel {
            peer,
            network: self.clone(),
        })
    }

    /// Make connection attempts from `peer` fail.
    pub fn set_refuse_connect(&self, peer: &PeerId, refuse: bool) {
        self.state.lock().node_mut(peer).refuse_connect = refuse;
    }

    /// Make every message sent to `peer` fail with `status`, or clear the fault.
    pub fn set_send_failure(&self, peer: &PeerId, status: Option<i32>) {
        self.state.lock().node_mut(peer).send_failure = status;
    }

    /// The record currently stored at `path`, regardless of connection state.
    pub fn stored_record(&self, path: &str) -> Option<Record> {
        self.state.lock().records.get(path).cloned()
    }

    pub fn stats(&self, peer: &PeerId) -> NodeStats {
        self.state
            .lock()
            .nodes
            .get(peer)
            .map(|n| n.stats)
            .unwrap_or_default()
    }

    pub fn record_listener_count(&self, peer: &PeerId) -> usize {
        self.state
            .lock()
            .nodes
            .get(peer)
            .map_or(0, |n| n.record_listeners.len())
    }

    pub fn message_listener_count(&self, peer: &PeerId) -> usize {
        self.state
            .lock()
            .nodes
            .get(peer)
            .map_or(0, |n| n.message_listeners.len())
    }
}

/// One node's handle onto a [`LoopbackNetwork`].
pub struct LoopbackChannel {
    peer: PeerId,
    network: LoopbackNetwork,
}

impl LoopbackChannel {
    pub fn network(&self) -> &LoopbackNetwork {
        &self.network
    }
}

#[async_trait]
impl Channel for LoopbackChannel {
    fn local_peer(&self) -> PeerId {
        self.peer.clone()
    }

    async fn connect(&self) -> Result<(), ChannelError> {
        let latency = self.network.config.connect_latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.network.state.lock();
        let node = state.node_mut(&self.peer);
        if node.refuse_connect {
            return Err(ChannelError::ConnectFailed(format!(
                "{} refused by loopback network",
                self.peer
            )));
        }
        node.connected = true;
        node.stats.connects += 1;
        Ok(())
    }

    async fn disconnect(&self) {
        self.network.state.lock().node_mut(&self.peer).connected = false;
    }

    fn is_connected(&self) -> bool {
        self.network.state.lock().is_connected(&self.peer)
    }

    async fn put_record(&self, request: PutRecordRequest) -> Result<Record, ChannelError> {
        let batch_delay = self.network.config.batch_delay;
        let record = {
            let mut state = self.network.state.lock();
            if !state.is_connected(&self.peer) {
                return Err(ChannelError::NotConnected);
            }

            state.next_sequence += 1;
            let record = Record {
                path: request.path.clone(),
                origin: self.peer.clone(),
                sequence: state.next_sequence,
                data: request.data,
            };
            state.records.insert(request.path, record.clone());
            state.node_mut(&self.peer).stats.records_put += 1;

            if request.urgent || batch_delay.is_zero() {
                state.fan_out(&[RecordEvent {
                    kind: RecordEventKind::Changed,
                    record: record.clone(),
                }]);
            }
            record
        };

        if !request.urgent && !batch_delay.is_zero() {
            let network = self.network.clone();
            let batched = record.clone();
            tokio::spawn(async move {
                tokio::time::sleep(batch_delay).await;
                let mut state = network.state.lock();
                // A newer write to the same path makes this delivery stale.
                let current = state
                    .records
                    .get(&batched.path)
                    .is_some_and(|r| r.sequence == batched.sequence);
                if current {
                    state.fan_out(&[RecordEvent {
                        kind: RecordEventKind::Changed,
                        record: batched,
                    }]);
                }
            });
        }

        Ok(record)
    }

    async fn get_records(&self, path: &str) -> Result<Vec<Record>, ChannelError> {
        let state = self.network.state.lock();
        if !state.is_connected(&self.peer) {
            return Err(ChannelError::NotConnected);
        }
        Ok(state.records.get(path).cloned().into_iter().collect())
    }

    async fn connected_peers(&self) -> Result<Vec<PeerId>, ChannelError> {
        let state = self.network.state.lock();
        if !state.is_connected(&self.peer) {
            return Err(ChannelError::NotConnected);
        }
        let mut peers: Vec<PeerId> = state
            .nodes
            .iter()
            .filter(|(peer, node)| node.connected && **peer != self.peer)
            .map(|(peer, _)| peer.clone())
            .collect();
        peers.sort();
        Ok(peers)
    }

    async fn send_message(
        &self,
        peer: &PeerId,
        path: &str,
        payload: Vec<u8>,
    ) -> Result<(), ChannelError> {
        let mut state = self.network.state.lock();
        if !state.is_connected(&self.peer) {
            return Err(ChannelError::NotConnected);
        }

        let target = match state.nodes.get_mut(peer) {
            Some(node) if node.connected => node,
            _ => return Err(ChannelError::PeerUnreachable(peer.to_string())),
        };

        if let Some(status) = target.send_failure {
            return Err(ChannelError::SendFailed {
                peer: peer.to_string(),
                status,
            });
        }

        target.stats.messages_received += 1;
        let event = MessageEvent {
            source: self.peer.clone(),
            path: path.to_string(),
            payload,
        };
        target
            .message_listeners
            .retain(|(_, listener)| listener.send(event.clone()).is_ok());
        Ok(())
    }

    fn add_record_listener(&self, listener: RecordListener) -> ListenerId {
        let mut state = self.network.state.lock();
        let id = state.next_listener_id();
        state.node_mut(&self.peer).record_listeners.push((id, listener));
        id
    }

    fn remove_record_listener(&self, id: ListenerId) -> bool {
        let mut state = self.network.state.lock();
        let listeners = &mut state.node_mut(&self.peer).record_listeners;
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    fn add_message_listener(&self, listener: MessageListener) -> ListenerId {
        let mut state = self.network.state.lock();
        let id = state.next_listener_id();
        state.node_mut(&self.peer).message_listeners.push((id, listener));
        id
    }

    fn remove_message_listener(&self, id: ListenerId) -> bool {
        let mut state = self.network.state.lock();
        let listeners = &mut state.node_mut(&self.peer).message_listeners;
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }
}
