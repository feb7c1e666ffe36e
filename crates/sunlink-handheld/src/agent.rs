//! Handheld side of the sync: turns triggers into published snapshots.

use std::sync::Arc;

use chrono::{DateTime, NaiveTime, Utc};
use parking_lot::Mutex;
use sunlink_channel::{Channel, ChannelClient, RunOutcome};
use sunlink_core::SyncError;
use sunlink_weather::WeatherSnapshot;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::prefs::Preferences;
use crate::store::ForecastStore;
use crate::trigger::SyncTrigger;

/// Forecast store shared between the agent and whoever writes forecasts.
pub type SharedForecastStore = Arc<Mutex<dyn ForecastStore>>;

/// Label of the deferred publish registered while disconnected.
const PUBLISH_ON_CONNECT: &str = "publish_latest_snapshot";

/// Result of one publish attempt.
#[derive(Debug)]
pub enum PublishOutcome {
    Published(WeatherSnapshot),
    /// No forecast row for today or later; nothing was sent.
    NoForecast,
    Failed(SyncError),
}

impl PublishOutcome {
    pub fn is_published(&self) -> bool {
        matches!(self, PublishOutcome::Published(_))
    }
}

/// Start of the UTC day containing `now`. Forecast rows are keyed by day.
pub fn start_of_utc_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_time(NaiveTime::MIN).and_utc()
}

/// Publishes the latest forecast as a [`WeatherSnapshot`] record.
#[derive(Clone)]
pub struct SyncAgent {
    client: Arc<ChannelClient<dyn Channel>>,
    store: SharedForecastStore,
    preferences: Arc<dyn Preferences>,
}

impl SyncAgent {
    pub fn new(
        client: Arc<ChannelClient<dyn Channel>>,
        store: SharedForecastStore,
        preferences: Arc<dyn Preferences>,
    ) -> Self {
        Self {
            client,
            store,
            preferences,
        }
    }

    pub fn client(&self) -> &Arc<ChannelClient<dyn Channel>> {
        &self.client
    }

    /// Build a snapshot from the first forecast row dated today or later.
    pub async fn load_snapshot(&self) -> Result<Option<WeatherSnapshot>, SyncError> {
        let location = self.preferences.preferred_location();
        let is_metric = self.preferences.is_metric();
        let since = start_of_utc_day(Utc::now());

        let store = self.store.clone();
        let row = tokio::task::spawn_blocking(move || store.lock().latest_forecast(&location, since))
            .await
            .map_err(|e| anyhow::anyhow!("forecast query task failed: {}", e))??;

        Ok(row.map(|row| WeatherSnapshot::from_forecast(row, is_metric)))
    }

    /// Query the store and publish the result under `/weather`.
    ///
    /// Failures end in a log line; nothing is retried.
    pub async fn publish_latest_snapshot(&self) -> PublishOutcome {
        let snapshot = match self.load_snapshot().await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                tracing::debug!("No forecast available, nothing to publish");
                return PublishOutcome::NoForecast;
            }
            Err(e) => {
                tracing::error!("Failed to read forecast: {}", e);
                return PublishOutcome::Failed(e);
            }
        };

        match self.client.channel().put_record(snapshot.to_put_request()).await {
            Ok(record) => {
                tracing::info!(
                    "Published weather snapshot (code {}, seq {})",
                    snapshot.condition_code,
                    record.sequence
                );
                PublishOutcome::Published(snapshot)
            }
            Err(e) => {
                if e.is_transient() {
                    tracing::warn!("Failed to publish weather snapshot: {}", e);
                } else {
                    tracing::error!("Failed to publish weather snapshot: {}", e);
                }
                PublishOutcome::Failed(e.into())
            }
        }
    }

    /// Publish now, or once the next connection comes up.
    pub async fn publish_when_connected(&self) -> RunOutcome {
        let agent = self.clone();
        self.client
            .run_when_connected(PUBLISH_ON_CONNECT, move || async move {
                agent.publish_latest_snapshot().await;
            })
            .await
    }

    /// Explicit push command. `send_data = false` does nothing.
    pub async fn push_now(&self, send_data: bool) {
        self.handle_trigger(SyncTrigger::PushNow { send_data }).await;
    }

    pub async fn handle_trigger(&self, trigger: SyncTrigger) {
        if !trigger.requests_sync() {
            tracing::debug!("Ignoring trigger {:?}", trigger);
            return;
        }

        if trigger.needs_connection() {
            let outcome = self.publish_when_connected().await;
            tracing::debug!("Publish for {:?}: {:?}", trigger, outcome);
        } else {
            tracing::debug!("Data request from peer");
            self.publish_latest_snapshot().await;
        }
    }

    /// Consume triggers and peer messages until `shutdown` fires.
    ///
    /// Each trigger is handled on its own task so a slow connect never
    /// blocks the queue.
    pub async fn run(self, mut triggers: mpsc::Receiver<SyncTrigger>, shutdown: CancellationToken) {
        let channel = self.client.channel().clone();
        let (message_tx, mut messages) = mpsc::unbounded_channel();
        let listener = channel.add_message_listener(message_tx);
        tracing::info!("Sync agent started as {}", channel.local_peer());

        match self.client.connect().await {
            Ok(outcome) => tracing::debug!("Initial connect: {:?}", outcome),
            Err(e) => tracing::warn!("Sync agent starting disconnected: {}", e),
        }

        let mut triggers_open = true;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                trigger = triggers.recv(), if triggers_open => match trigger {
                    Some(trigger) => self.dispatch(trigger),
                    None => {
                        tracing::debug!("Trigger queue closed");
                        triggers_open = false;
                    }
                },
                Some(message) = messages.recv() => {
                    self.dispatch(SyncTrigger::PeerMessage(message));
                }
            }
        }

        channel.remove_message_listener(listener);
        tracing::info!("Sync agent stopped");
    }

    fn dispatch(&self, trigger: SyncTrigger) {
        let agent = self.clone();
        tokio::spawn(async move {
            agent.handle_trigger(trigger).await;
        });
    }
}
