//! Channel abstraction shared by the handheld and the wearable.
//!
//! Provides the [`Channel`] trait (record replication plus one-shot
//! messages), the [`ChannelClient`] connection state machine, and an
//! in-process [`LoopbackNetwork`] implementation.

pub mod channel;
pub mod client;
pub mod data;
pub mod loopback;

pub use channel::{Channel, ListenerId, MessageListener, RecordListener};
pub use client::{ChannelClient, ConnectOutcome, ConnectionState, RunOutcome};
pub use data::{
    DataMap, DataValue, MessageEvent, PeerId, PutRecordRequest, Record, RecordEvent,
    RecordEventKind,
};
pub use loopback::{LoopbackChannel, LoopbackConfig, LoopbackNetwork, NodeStats};
