use async_trait::async_trait;
use sunlink_core::ChannelError;
use tokio::sync::mpsc;

use crate::data::{MessageEvent, PeerId, PutRecordRequest, Record, RecordEvent};

/// Handle returned when a listener is registered, used to remove it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Sink that receives batches of record changes.
pub type RecordListener = mpsc::UnboundedSender<Vec<RecordEvent>>;

/// Sink that receives one-shot messages addressed to this node.
pub type MessageListener = mpsc::UnboundedSender<MessageEvent>;

/// Peer-to-peer record replication and one-shot messaging between paired devices.
///
/// Records are keyed by path with last-write-wins semantics. Messages are
/// fire-and-forget and only reach peers that are connected at send time.
/// Implementations report failures as [`ChannelError`]; they never retry.
#[async_trait]
pub trait Channel: Send + Sync + 'static {
    /// This node's identity on the channel.
    fn local_peer(&self) -> PeerId;

    async fn connect(&self) -> Result<(), ChannelError>;

    async fn disconnect(&self);

    fn is_connected(&self) -> bool;

    /// Store a record, replacing any record at the same path.
    async fn put_record(&self, request: PutRecordRequest) -> Result<Record, ChannelError>;

    /// All currently stored records under `path`.
    async fn get_records(&self, path: &str) -> Result<Vec<Record>, ChannelError>;

    /// Peers reachable right now, excluding this node.
    async fn connected_peers(&self) -> Result<Vec<PeerId>, ChannelError>;

    async fn send_message(
        &self,
        peer: &PeerId,
        path: &str,
        payload: Vec<u8>,
    ) -> Result<(), ChannelError>;

    fn add_record_listener(&self, listener: RecordListener) -> ListenerId;

    /// Returns false if no listener with `id` was registered.
    fn remove_record_listener(&self, id: ListenerId) -> bool;

    fn add_message_listener(&self, listener: MessageListener) -> ListenerId;

    fn remove_message_listener(&self, id: ListenerId) -> bool;
}
