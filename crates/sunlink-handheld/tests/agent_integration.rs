//! Integration tests for SyncAgent over the loopback transport.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Days, Utc};
use parking_lot::Mutex;
use sunlink_channel::{Channel, ChannelClient, LoopbackConfig, LoopbackNetwork, PeerId};
use sunlink_core::UnitSystem;
use sunlink_handheld::{
    PublishOutcome, SharedForecastStore, SqliteForecastStore, StaticPreferences, SyncAgent,
    SyncTrigger,
};
use sunlink_weather::{ForecastRow, WeatherSnapshot, LATEST_DATA_PATH, WEATHER_PATH};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

struct Harness {
    network: LoopbackNetwork,
    store: Arc<Mutex<SqliteForecastStore>>,
    prefs: Arc<StaticPreferences>,
    agent: SyncAgent,
}

fn harness() -> Harness {
    let network = LoopbackNetwork::new(LoopbackConfig {
        batch_delay: Duration::ZERO,
        connect_latency: Duration::ZERO,
    });
    let channel: Arc<dyn Channel> = network.node("phone");
    let client = Arc::new(ChannelClient::new(channel));
    let store = Arc::new(Mutex::new(SqliteForecastStore::in_memory().unwrap()));
    let prefs = Arc::new(StaticPreferences::new("94043", UnitSystem::Metric));
    let shared: SharedForecastStore = store.clone();
    let agent = SyncAgent::new(client, shared, prefs.clone());
    Harness {
        network,
        store,
        prefs,
        agent,
    }
}

fn clear_row() -> ForecastRow {
    ForecastRow {
        condition_code: 800,
        description: "Clear".to_string(),
        max_temperature: 25.0,
        min_temperature: 15.0,
    }
}

fn seed_today(h: &Harness, row: &ForecastRow) {
    let today = Utc::now().date_naive();
    h.store.lock().insert_forecast("94043", today, row).unwrap();
}

fn published(network: &LoopbackNetwork) -> Option<WeatherSnapshot> {
    network
        .stored_record(WEATHER_PATH)
        .map(|record| WeatherSnapshot::from_record(&record).unwrap())
}

async fn wait_for_publish(network: &LoopbackNetwork) -> Option<WeatherSnapshot> {
    for _ in 0..200 {
        if let Some(snapshot) = published(network) {
            return Some(snapshot);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    None
}

#[tokio::test]
async fn test_publish_copies_row_and_preference() {
    let h = harness();
    seed_today(&h, &clear_row());
    h.agent.client().connect().await.unwrap();

    let outcome = h.agent.publish_latest_snapshot().await;
    assert!(outcome.is_published());

    let snapshot = published(&h.network).unwrap();
    assert_eq!(snapshot, WeatherSnapshot::from_forecast(clear_row(), true));
}

#[tokio::test]
async fn test_imperial_preference_is_sent() {
    let h = harness();
    seed_today(&h, &clear_row());
    h.prefs.set_units(UnitSystem::Imperial);
    h.agent.client().connect().await.unwrap();

    h.agent.publish_latest_snapshot().await;

    let snapshot = published(&h.network).unwrap();
    assert!(!snapshot.is_metric_preferred);
    // Temperatures stay in Celsius on the wire.
    assert_eq!(snapshot.max_temperature, 25.0);
}

#[tokio::test]
async fn test_no_row_publishes_nothing() {
    let h = harness();
    h.agent.client().connect().await.unwrap();

    let outcome = h.agent.publish_latest_snapshot().await;
    assert!(matches!(outcome, PublishOutcome::NoForecast));
    assert!(h.network.stored_record(WEATHER_PATH).is_none());
}

#[tokio::test]
async fn test_yesterday_row_is_not_published() {
    let h = harness();
    let yesterday = Utc::now().date_naive().checked_sub_days(Days::new(1)).unwrap();
    h.store
        .lock()
        .insert_forecast("94043", yesterday, &clear_row())
        .unwrap();
    h.agent.client().connect().await.unwrap();

    let outcome = h.agent.publish_latest_snapshot().await;
    assert!(matches!(outcome, PublishOutcome::NoForecast));
}

#[tokio::test]
async fn test_publish_while_disconnected_fails_without_panic() {
    let h = harness();
    seed_today(&h, &clear_row());

    let outcome = h.agent.publish_latest_snapshot().await;
    assert!(matches!(outcome, PublishOutcome::Failed(_)));
    assert!(h.network.stored_record(WEATHER_PATH).is_none());
}

#[tokio::test]
async fn test_forecast_changed_connects_then_publishes() {
    let h = harness();
    seed_today(&h, &clear_row());

    h.agent.handle_trigger(SyncTrigger::ForecastChanged).await;

    assert!(h.agent.client().is_connected());
    assert!(published(&h.network).is_some());
    assert_eq!(h.network.stats(&PeerId::new("phone")).records_put, 1);
}

#[tokio::test]
async fn test_push_now_false_is_noop() {
    let h = harness();
    seed_today(&h, &clear_row());

    h.agent.push_now(false).await;

    assert!(!h.agent.client().is_connected());
    assert_eq!(h.network.stats(&PeerId::new("phone")).connects, 0);
    assert!(h.network.stored_record(WEATHER_PATH).is_none());
}

#[tokio::test]
async fn test_refused_connect_keeps_one_pending_publish() {
    let h = harness();
    seed_today(&h, &clear_row());
    let phone = PeerId::new("phone");
    h.network.set_refuse_connect(&phone, true);

    h.agent.handle_trigger(SyncTrigger::ForecastChanged).await;
    h.agent.push_now(true).await;

    assert_eq!(
        h.agent.client().pending_labels(),
        vec!["publish_latest_snapshot"]
    );
    assert!(h.network.stored_record(WEATHER_PATH).is_none());

    h.network.set_refuse_connect(&phone, false);
    h.agent.client().connect().await.unwrap();

    assert!(h.agent.client().pending_labels().is_empty());
    assert_eq!(h.network.stats(&phone).records_put, 1);
}

#[tokio::test]
async fn test_run_answers_latest_data_request() {
    let h = harness();
    seed_today(&h, &clear_row());
    let (_trigger_tx, trigger_rx) = mpsc::channel(8);
    let shutdown = CancellationToken::new();
    let agent_task = tokio::spawn(h.agent.clone().run(trigger_rx, shutdown.clone()));

    let watch = h.network.node("watch");
    watch.connect().await.unwrap();
    // Wait for the agent's own connect before messaging it.
    for _ in 0..200 {
        if h.agent.client().is_connected() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    watch
        .send_message(&PeerId::new("phone"), LATEST_DATA_PATH, Vec::new())
        .await
        .unwrap();

    let snapshot = wait_for_publish(&h.network).await.expect("no snapshot was published");
    assert_eq!(snapshot.condition_code, 800);

    shutdown.cancel();
    agent_task.await.unwrap();
    assert_eq!(h.network.message_listener_count(&PeerId::new("phone")), 0);
}

#[tokio::test]
async fn test_run_ignores_other_message_paths() {
    let h = harness();
    seed_today(&h, &clear_row());
    let (_trigger_tx, trigger_rx) = mpsc::channel(8);
    let shutdown = CancellationToken::new();
    let agent_task = tokio::spawn(h.agent.clone().run(trigger_rx, shutdown.clone()));

    let watch = h.network.node("watch");
    watch.connect().await.unwrap();
    for _ in 0..200 {
        if h.agent.client().is_connected() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    watch
        .send_message(&PeerId::new("phone"), "/count", Vec::new())
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(h.network.stored_record(WEATHER_PATH).is_none());

    shutdown.cancel();
    agent_task.await.unwrap();
}

#[tokio::test]
async fn test_run_handles_queued_triggers() {
    let h = harness();
    seed_today(&h, &clear_row());
    let (trigger_tx, trigger_rx) = mpsc::channel(8);
    let shutdown = CancellationToken::new();
    let agent_task = tokio::spawn(h.agent.clone().run(trigger_rx, shutdown.clone()));

    trigger_tx.send(SyncTrigger::ForecastChanged).await.unwrap();
    drop(trigger_tx);

    let snapshot = wait_for_publish(&h.network).await.expect("no snapshot was published");
    assert_eq!(snapshot.description, "Clear");

    shutdown.cancel();
    agent_task.await.unwrap();
}
