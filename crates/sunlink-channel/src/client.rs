//! Connection state machine around a [`Channel`].
//!
//! Tracks `Disconnected → Connecting → Connected` and holds actions that must
//! run once the next connection is established. Pending actions are keyed by
//! label: registering a label that is already pending is a no-op, so
//! overlapping triggers during one connection attempt produce a single run.
//! Transport connect and disconnect calls are serialized, and a disconnect
//! only tears the transport down if no newer connect has started since.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use sunlink_core::ChannelError;

use crate::channel::Channel;

/// Connection state as seen by the owner of the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    /// True if a new connection attempt should be started.
    pub fn can_start_connect(self) -> bool {
        matches!(self, ConnectionState::Disconnected)
    }

    pub fn is_connected(self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

/// What a call to [`ChannelClient::connect`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// This call established the connection and ran the pending actions.
    Connected,
    AlreadyConnected,
    /// Another caller's attempt is in flight; it will run the pending actions.
    InProgress,
    /// A disconnect arrived while this attempt was in flight.
    Superseded,
}

/// What a call to [`ChannelClient::run_when_connected`] did with its action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    RanNow,
    /// Registered; runs when the connection comes up.
    Deferred,
    /// An action with the same label was already pending; this one was dropped.
    Coalesced,
}

type OnConnected = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

#[derive(Default)]
struct ClientInner {
    state: ConnectionState,
    /// Bumped by every disconnect so late connect completions can be discarded.
    epoch: u64,
    pending: Vec<(&'static str, OnConnected)>,
}

/// Owned connection manager shared by everything on one device that talks to the channel.
pub struct ChannelClient<C: Channel + ?Sized> {
    channel: Arc<C>,
    inner: Mutex<ClientInner>,
    /// Held across transport connect and disconnect so they never interleave.
    transport: tokio::sync::Mutex<()>,
}

impl<C: Channel + ?Sized> ChannelClient<C> {
    pub fn new(channel: Arc<C>) -> Self {
        Self {
            channel,
            inner: Mutex::new(ClientInner::default()),
            transport: tokio::sync::Mutex::new(()),
        }
    }

    pub fn channel(&self) -> &Arc<C> {
        &self.channel
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.lock().state
    }

    /// Connected according to both our state machine and the transport.
    pub fn is_connected(&self) -> bool {
        self.state().is_connected() && self.channel.is_connected()
    }

    /// Labels of the actions waiting for the next connection.
    pub fn pending_labels(&self) -> Vec<&'static str> {
        self.inner.lock().pending.iter().map(|(label, _)| *label).collect()
    }

    /// Connect if not already connected or connecting.
    ///
    /// On success the pending actions are taken out of the queue under the
    /// lock, then awaited in registration order. On failure they stay queued
    /// for the next successful connection.
    pub async fn connect(&self) -> Result<ConnectOutcome, ChannelError> {
        let epoch = {
            let mut inner = self.inner.lock();
            match inner.state {
                ConnectionState::Connected if self.channel.is_connected() => {
                    return Ok(ConnectOutcome::AlreadyConnected)
                }
                ConnectionState::Connecting => return Ok(ConnectOutcome::InProgress),
                _ => {
                    inner.state = ConnectionState::Connecting;
                    inner.epoch
                }
            }
        };

        let transport = self.transport.lock().await;
        let superseded = self.inner.lock().epoch != epoch;
        if superseded {
            tracing::debug!("Connection attempt superseded before it started");
            return Ok(ConnectOutcome::Superseded);
        }

        tracing::debug!("Connecting to channel as {}", self.channel.local_peer());
        let result = self.channel.connect().await;

        enum Next {
            Run(Vec<(&'static str, OnConnected)>),
            Failed,
            Stale,
        }

        let next = {
            let mut inner = self.inner.lock();
            if inner.epoch != epoch {
                Next::Stale
            } else if result.is_ok() {
                inner.state = ConnectionState::Connected;
                Next::Run(std::mem::take(&mut inner.pending))
            } else {
                inner.state = ConnectionState::Disconnected;
                Next::Failed
            }
        };
        drop(transport);

        match next {
            Next::Stale => {
                // The disconnect that bumped the epoch is queued on the
                // transport lock and tears the connection down itself.
                tracing::debug!("Connection attempt superseded by disconnect");
                Ok(ConnectOutcome::Superseded)
            }
            Next::Failed => {
                let err = result.err().unwrap_or(ChannelError::Closed);
                tracing::warn!("Channel connection failed: {}", err);
                Err(err)
            }
            Next::Run(actions) => {
                tracing::info!(
                    "Channel connected, running {} pending action(s)",
                    actions.len()
                );
                for (label, action) in actions {
                    tracing::debug!("Running on-connect action: {}", label);
                    action().await;
                }
                Ok(ConnectOutcome::Connected)
            }
        }
    }

    /// Drop the connection. Pending actions are kept for the next connection.
    pub async fn disconnect(&self) {
        let epoch = self.mark_disconnected();
        self.release_transport(epoch).await;
    }

    /// Mark the client disconnected now and return the transport teardown.
    ///
    /// Any `connect` issued after this call wins over the returned future,
    /// whichever of the two gets polled first.
    pub fn disconnect_later(self: &Arc<Self>) -> impl Future<Output = ()> + Send + 'static {
        let epoch = self.mark_disconnected();
        let client = Arc::clone(self);
        async move { client.release_transport(epoch).await }
    }

    fn mark_disconnected(&self) -> u64 {
        let mut inner = self.inner.lock();
        inner.epoch = inner.epoch.wrapping_add(1);
        inner.state = ConnectionState::Disconnected;
        inner.epoch
    }

    async fn release_transport(&self, epoch: u64) {
        let _transport = self.transport.lock().await;
        let still_wanted = {
            let inner = self.inner.lock();
            inner.epoch == epoch && inner.state == ConnectionState::Disconnected
        };
        if !still_wanted {
            tracing::debug!("Skipping transport teardown, a newer connection took over");
            return;
        }
        self.channel.disconnect().await;
        tracing::debug!("Channel disconnected");
    }

    /// Run `action` now if connected; otherwise queue it under `label` and connect.
    ///
    /// The connected check and the enqueue happen under one lock, so an
    /// action is never queued behind a connect that already drained the queue.
    /// Connection errors are logged, not returned: the action stays queued.
    pub async fn run_when_connected<F, Fut>(&self, label: &'static str, action: F) -> RunOutcome
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut action = Some(action);
        let outcome = {
            let mut inner = self.inner.lock();
            if inner.state.is_connected() && self.channel.is_connected() {
                RunOutcome::RanNow
            } else if inner.pending.iter().any(|(pending, _)| *pending == label) {
                RunOutcome::Coalesced
            } else {
                if let Some(action) = action.take() {
                    let boxed: OnConnected =
                        Box::new(move || -> BoxFuture<'static, ()> { Box::pin(action()) });
                    inner.pending.push((label, boxed));
                }
                RunOutcome::Deferred
            }
        };

        match outcome {
            RunOutcome::RanNow => {
                if let Some(action) = action {
                    action().await;
                }
                return outcome;
            }
            RunOutcome::Coalesced => {
                tracing::debug!("On-connect action {} already pending", label);
            }
            RunOutcome::Deferred => {}
        }

        // Logged inside connect(); the action stays queued on failure.
        let _ = self.connect().await;

        outcome
    }
}
