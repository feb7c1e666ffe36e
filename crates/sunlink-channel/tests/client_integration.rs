//! Integration tests for ChannelClient over the loopback transport.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sunlink_channel::{
    Channel, ChannelClient, ConnectOutcome, ConnectionState, ListenerId, LoopbackChannel,
    LoopbackConfig, LoopbackNetwork, MessageListener, PeerId, PutRecordRequest, Record,
    RecordListener, RunOutcome,
};
use sunlink_core::ChannelError;

fn slow_network() -> LoopbackNetwork {
    LoopbackNetwork::new(LoopbackConfig {
        connect_latency: Duration::from_millis(500),
        ..LoopbackConfig::default()
    })
}

/// Loopback node whose transport disconnect lands only after a delay.
struct LaggingDisconnect {
    inner: Arc<LoopbackChannel>,
    lag: Duration,
}

#[async_trait]
impl Channel for LaggingDisconnect {
    fn local_peer(&self) -> PeerId {
        self.inner.local_peer()
    }

    async fn connect(&self) -> Result<(), ChannelError> {
        self.inner.connect().await
    }

    async fn disconnect(&self) {
        tokio::time::sleep(self.lag).await;
        self.inner.disconnect().await;
    }

    fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    async fn put_record(&self, request: PutRecordRequest) -> Result<Record, ChannelError> {
        self.inner.put_record(request).await
    }

    async fn get_records(&self, path: &str) -> Result<Vec<Record>, ChannelError> {
        self.inner.get_records(path).await
    }

    async fn connected_peers(&self) -> Result<Vec<PeerId>, ChannelError> {
        self.inner.connected_peers().await
    }

    async fn send_message(
        &self,
        peer: &PeerId,
        path: &str,
        payload: Vec<u8>,
    ) -> Result<(), ChannelError> {
        self.inner.send_message(peer, path, payload).await
    }

    fn add_record_listener(&self, listener: RecordListener) -> ListenerId {
        self.inner.add_record_listener(listener)
    }

    fn remove_record_listener(&self, id: ListenerId) -> bool {
        self.inner.remove_record_listener(id)
    }

    fn add_message_listener(&self, listener: MessageListener) -> ListenerId {
        self.inner.add_message_listener(listener)
    }

    fn remove_message_listener(&self, id: ListenerId) -> bool {
        self.inner.remove_message_listener(id)
    }
}

fn lagging_client(network: &LoopbackNetwork) -> Arc<ChannelClient<LaggingDisconnect>> {
    Arc::new(ChannelClient::new(Arc::new(LaggingDisconnect {
        inner: network.node("watch"),
        lag: Duration::from_millis(10),
    })))
}

fn counting_action(counter: &Arc<AtomicU32>) -> impl FnOnce() -> std::future::Ready<()> + Send {
    let counter = counter.clone();
    move || {
        counter.fetch_add(1, Ordering::SeqCst);
        std::future::ready(())
    }
}

#[tokio::test]
async fn test_runs_immediately_when_connected() {
    let network = LoopbackNetwork::default();
    let client = ChannelClient::new(network.node("phone"));
    client.connect().await.unwrap();

    let runs = Arc::new(AtomicU32::new(0));
    let outcome = client.run_when_connected("publish", counting_action(&runs)).await;

    assert_eq!(outcome, RunOutcome::RanNow);
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_deferred_action_runs_once_on_connect() {
    let network = LoopbackNetwork::default();
    let client = ChannelClient::new(network.node("phone"));

    let runs = Arc::new(AtomicU32::new(0));
    let outcome = client.run_when_connected("publish", counting_action(&runs)).await;

    assert_eq!(outcome, RunOutcome::Deferred);
    assert_eq!(client.state(), ConnectionState::Connected);
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert!(client.pending_labels().is_empty());

    // A later reconnect must not replay the drained action.
    client.disconnect().await;
    client.connect().await.unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_overlapping_requests_coalesce_into_one_run() {
    let network = slow_network();
    let client = Arc::new(ChannelClient::new(network.node("phone")));
    let runs = Arc::new(AtomicU32::new(0));

    let first = {
        let client = client.clone();
        let action = counting_action(&runs);
        tokio::spawn(async move { client.run_when_connected("publish", action).await })
    };
    tokio::task::yield_now().await;
    assert_eq!(client.state(), ConnectionState::Connecting);

    let second = client.run_when_connected("publish", counting_action(&runs)).await;
    let third = client.run_when_connected("publish", counting_action(&runs)).await;
    assert_eq!(second, RunOutcome::Coalesced);
    assert_eq!(third, RunOutcome::Coalesced);

    assert_eq!(first.await.unwrap(), RunOutcome::Deferred);
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(network.stats(&client.channel().local_peer()).connects, 1);
}

#[tokio::test]
async fn test_failed_connect_keeps_single_pending_action() {
    let network = LoopbackNetwork::default();
    let phone = network.node("phone");
    network.set_refuse_connect(&phone.local_peer(), true);
    let client = ChannelClient::new(phone.clone());
    let runs = Arc::new(AtomicU32::new(0));

    assert_eq!(
        client.run_when_connected("publish", counting_action(&runs)).await,
        RunOutcome::Deferred
    );
    assert_eq!(
        client.run_when_connected("publish", counting_action(&runs)).await,
        RunOutcome::Coalesced
    );
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(client.pending_labels(), vec!["publish"]);
    assert_eq!(runs.load(Ordering::SeqCst), 0);

    network.set_refuse_connect(&phone.local_peer(), false);
    assert_eq!(client.connect().await.unwrap(), ConnectOutcome::Connected);
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_during_connect_supersedes_attempt() {
    let network = slow_network();
    let client = Arc::new(ChannelClient::new(network.node("watch")));

    let attempt = {
        let client = client.clone();
        tokio::spawn(async move { client.connect().await })
    };
    tokio::task::yield_now().await;
    client.disconnect().await;

    assert_eq!(attempt.await.unwrap().unwrap(), ConnectOutcome::Superseded);
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert!(!client.channel().is_connected());
}

#[tokio::test]
async fn test_connect_is_idempotent() {
    let network = LoopbackNetwork::default();
    let client = ChannelClient::new(network.node("watch"));

    assert_eq!(client.connect().await.unwrap(), ConnectOutcome::Connected);
    assert_eq!(client.connect().await.unwrap(), ConnectOutcome::AlreadyConnected);
    assert!(client.is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_waits_for_slow_disconnect() {
    let network = LoopbackNetwork::default();
    let client = lagging_client(&network);
    client.connect().await.unwrap();

    let teardown = tokio::spawn(client.disconnect_later());
    // Let the teardown start its slow transport disconnect.
    tokio::task::yield_now().await;
    assert_eq!(client.state(), ConnectionState::Disconnected);

    assert_eq!(client.connect().await.unwrap(), ConnectOutcome::Connected);
    teardown.await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(client.state(), ConnectionState::Connected);
    assert!(client.channel().is_connected());
    assert!(client.is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_connect_after_disconnect_later_wins_regardless_of_poll_order() {
    let network = LoopbackNetwork::default();
    let client = lagging_client(&network);
    client.connect().await.unwrap();

    // The teardown is not polled until after the new connect completes.
    let teardown = client.disconnect_later();
    assert_eq!(client.connect().await.unwrap(), ConnectOutcome::Connected);
    teardown.await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(client.is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_later_tears_down_when_nothing_reconnects() {
    let network = LoopbackNetwork::default();
    let client = lagging_client(&network);
    client.connect().await.unwrap();

    client.disconnect_later().await;

    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert!(!client.channel().is_connected());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_action_queued_beside_concurrent_connect_still_runs() {
    for _ in 0..200 {
        let network = LoopbackNetwork::default();
        let client = Arc::new(ChannelClient::new(network.node("phone")));
        let runs = Arc::new(AtomicU32::new(0));

        let connect = {
            let client = client.clone();
            tokio::spawn(async move { client.connect().await })
        };
        let deferred = {
            let client = client.clone();
            let action = counting_action(&runs);
            tokio::spawn(async move { client.run_when_connected("publish", action).await })
        };
        connect.await.unwrap().unwrap();
        deferred.await.unwrap();

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(client.pending_labels().is_empty());
        assert!(client.is_connected());
    }
}
