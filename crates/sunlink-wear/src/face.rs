//! The watch face engine.
//!
//! `WatchFace` owns all display state. Host callbacks (visibility, ambient
//! mode, time ticks, draw) run on the owning task. Channel work happens on
//! spawned tasks that only post [`FaceEvent`]s back; the host drains them
//! with [`WatchFace::next_event`] or [`WatchFace::process_pending`].

use std::sync::Arc;

use futures::future::join_all;
use sunlink_channel::{
    Channel, ChannelClient, ConnectOutcome, ListenerId, PeerId, Record, RecordEvent,
    RecordEventKind,
};
use sunlink_core::{ChannelError, WearConfig};
use sunlink_weather::{icon_for_condition, WeatherSnapshot, LATEST_DATA_PATH, WEATHER_PATH};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::canvas::Canvas;
use crate::clock::{delay_to_next_second, WallClock};
use crate::frame::{compose_ambient, compose_interactive, Frame, Layout};
use crate::icons::{IconCache, IconLoader};
use crate::throttle::RequestThrottle;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceOptions {
    /// Initial low-bit ambient flag, until the host reports device properties.
    pub low_bit_ambient: bool,
    /// Date text height; icons are scaled to it.
    pub date_text_height: f32,
}

impl Default for FaceOptions {
    fn default() -> Self {
        Self::from(&WearConfig::default())
    }
}

impl From<&WearConfig> for FaceOptions {
    fn from(config: &WearConfig) -> Self {
        Self {
            low_bit_ambient: config.low_bit_ambient,
            date_text_height: config.icon_height as f32,
        }
    }
}

/// Results posted back to the face by its background tasks.
#[derive(Debug)]
pub enum FaceEvent {
    ConnectFinished(Result<ConnectOutcome, ChannelError>),
    Hydrated(Result<Vec<Record>, ChannelError>),
    RecordsChanged(Vec<RecordEvent>),
    RequestSent { delivered: usize, failed: usize },
    RedrawTick { generation: u64 },
}

/// Everything the face shows, besides the time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisplayState {
    pub cached_snapshot: Option<WeatherSnapshot>,
    pub is_ambient: bool,
    pub is_visible: bool,
    pub low_bit_ambient: bool,
}

pub struct WatchFace {
    client: Arc<ChannelClient<dyn Channel>>,
    clock: Arc<dyn WallClock>,
    state: DisplayState,
    throttle: RequestThrottle,
    icons: IconCache,
    layout: Layout,
    events_tx: mpsc::UnboundedSender<FaceEvent>,
    events_rx: mpsc::UnboundedReceiver<FaceEvent>,
    record_listener: Option<ListenerId>,
    redraw_token: Option<CancellationToken>,
    /// Bumped on every cancel; ticks carrying an older value are dropped.
    redraw_generation: u64,
    needs_redraw: bool,
    invalidations: u64,
    requests_sent: u64,
}

impl WatchFace {
    pub fn new(
        client: Arc<ChannelClient<dyn Channel>>,
        clock: Arc<dyn WallClock>,
        icon_loader: Box<dyn IconLoader>,
        options: FaceOptions,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            client,
            clock,
            state: DisplayState {
                low_bit_ambient: options.low_bit_ambient,
                ..DisplayState::default()
            },
            throttle: RequestThrottle::default(),
            icons: IconCache::new(icon_loader, options.date_text_height),
            layout: Layout::new(options.date_text_height),
            events_tx,
            events_rx,
            record_listener: None,
            redraw_token: None,
            redraw_generation: 0,
            needs_redraw: true,
            invalidations: 0,
            requests_sent: 0,
        }
    }

    pub fn state(&self) -> &DisplayState {
        &self.state
    }

    pub fn client(&self) -> &Arc<ChannelClient<dyn Channel>> {
        &self.client
    }

    /// True if something changed since the last [`WatchFace::draw`].
    pub fn needs_redraw(&self) -> bool {
        self.needs_redraw
    }

    pub fn invalidations(&self) -> u64 {
        self.invalidations
    }

    /// Number of request rounds that passed both guards.
    pub fn requests_sent(&self) -> u64 {
        self.requests_sent
    }

    pub fn has_record_listener(&self) -> bool {
        self.record_listener.is_some()
    }

    pub fn is_redraw_scheduled(&self) -> bool {
        self.redraw_token.is_some()
    }

    // ---- Host callbacks ----

    pub fn on_visibility_changed(&mut self, visible: bool) {
        if visible == self.state.is_visible {
            return;
        }
        self.state.is_visible = visible;

        if visible {
            tracing::info!("Face visible, connecting");
            self.start_connect();
            self.invalidate();
        } else {
            tracing::info!("Face hidden, disconnecting");
            self.detach_record_listener();
            // Marked disconnected now; only the transport teardown is deferred.
            tokio::spawn(self.client.disconnect_later());
        }
        self.update_redraw_timer();
    }

    pub fn on_ambient_mode_changed(&mut self, ambient: bool) {
        if ambient == self.state.is_ambient {
            return;
        }
        tracing::debug!("Ambient mode: {}", ambient);
        self.state.is_ambient = ambient;
        self.invalidate();
        self.update_redraw_timer();
    }

    pub fn on_properties_changed(&mut self, low_bit_ambient: bool) {
        tracing::debug!("Device properties: low_bit_ambient={}", low_bit_ambient);
        self.state.low_bit_ambient = low_bit_ambient;
    }

    /// Minute tick from the host; the only redraw source in ambient mode.
    pub fn on_time_tick(&mut self) {
        self.invalidate();
    }

    /// Compose the current frame and render it onto `canvas`.
    ///
    /// An interactive frame without data also fires a throttled request.
    pub fn draw(&mut self, canvas: &mut dyn Canvas) -> Frame {
        let now = self.clock.now();
        let bounds = canvas.bounds();

        let frame = if self.state.is_ambient {
            compose_ambient(now, bounds, &self.layout, self.state.low_bit_ambient)
        } else {
            let weather = self.state.cached_snapshot.as_ref().map(|snapshot| {
                let icon = self.icons.get(icon_for_condition(snapshot.condition_code));
                (snapshot, icon)
            });
            compose_interactive(now, bounds, &self.layout, weather)
        };

        if frame.waiting_for_data() {
            self.request_fresh_data();
        }

        frame.render(canvas);
        self.needs_redraw = false;
        frame
    }

    // ---- Data freshness ----

    /// Load whatever is already stored under the weather path.
    pub fn hydrate_cache(&self) {
        let channel = self.client.channel().clone();
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let result = channel.get_records(WEATHER_PATH).await;
            let _ = events.send(FaceEvent::Hydrated(result));
        });
    }

    /// Apply one record change. Returns true if the cache was replaced.
    pub fn on_snapshot_changed(&mut self, event: &RecordEvent) -> bool {
        if event.path() != WEATHER_PATH {
            tracing::debug!("Ignoring record change on {}", event.path());
            return false;
        }
        if event.kind == RecordEventKind::Deleted {
            tracing::debug!("Ignoring deletion of {}", WEATHER_PATH);
            return false;
        }

        match WeatherSnapshot::from_record(&event.record) {
            Ok(snapshot) => {
                tracing::debug!("Weather snapshot updated (seq {})", event.record.sequence);
                self.state.cached_snapshot = Some(snapshot);
                self.invalidate();
                true
            }
            Err(e) => {
                tracing::warn!("Ignoring undecodable weather record: {}", e);
                false
            }
        }
    }

    /// Ask every connected peer for fresh data, at most once per cooldown.
    ///
    /// Does nothing while disconnected. Returns true if a request round was
    /// started; the sends themselves finish in the background.
    pub fn request_fresh_data(&mut self) -> bool {
        let now = Instant::now();
        if !self.throttle.ready(now) {
            tracing::debug!("Data request throttled");
            return false;
        }
        if !self.client.is_connected() {
            tracing::debug!("Not connected, skipping data request");
            return false;
        }

        self.throttle.record(now);
        self.requests_sent += 1;

        let channel = self.client.channel().clone();
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let (delivered, failed) = request_from_peers(channel).await;
            let _ = events.send(FaceEvent::RequestSent { delivered, failed });
        });
        true
    }

    // ---- Event pump ----

    pub async fn next_event(&mut self) -> Option<FaceEvent> {
        self.events_rx.recv().await
    }

    /// Handle every event already queued. Returns how many were handled.
    pub fn process_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    pub fn handle_event(&mut self, event: FaceEvent) {
        match event {
            FaceEvent::ConnectFinished(result) => self.on_connect_finished(result),
            FaceEvent::Hydrated(result) => self.on_hydrated(result),
            FaceEvent::RecordsChanged(batch) => {
                for event in &batch {
                    self.on_snapshot_changed(event);
                }
            }
            FaceEvent::RequestSent { delivered, failed } => {
                tracing::debug!("Data request delivered to {} peer(s), {} failed", delivered, failed);
            }
            FaceEvent::RedrawTick { generation } => self.on_redraw_tick(generation),
        }
    }

    // ---- Internals ----

    fn invalidate(&mut self) {
        self.needs_redraw = true;
        self.invalidations += 1;
    }

    fn start_connect(&self) {
        let client = self.client.clone();
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let result = client.connect().await;
            let _ = events.send(FaceEvent::ConnectFinished(result));
        });
    }

    fn on_connect_finished(&mut self, result: Result<ConnectOutcome, ChannelError>) {
        match result {
            Ok(ConnectOutcome::Connected | ConnectOutcome::AlreadyConnected) => {
                if !self.state.is_visible || !self.client.is_connected() {
                    tracing::debug!("Connection finished after face was hidden");
                    return;
                }
                tracing::info!("Face connected");
                self.attach_record_listener();
                self.hydrate_cache();
            }
            Ok(ConnectOutcome::InProgress) => {
                tracing::debug!("Connection already in progress");
            }
            Ok(ConnectOutcome::Superseded) => {
                tracing::debug!("Connection superseded by disconnect");
            }
            Err(e) => tracing::warn!("Face failed to connect: {}", e),
        }
    }

    fn on_hydrated(&mut self, result: Result<Vec<Record>, ChannelError>) {
        match result {
            Ok(records) => {
                for record in &records {
                    match WeatherSnapshot::from_record(record) {
                        Ok(snapshot) => self.state.cached_snapshot = Some(snapshot),
                        Err(e) => tracing::warn!("Skipping stored weather record: {}", e),
                    }
                }
                tracing::debug!("Hydrated from {} stored record(s)", records.len());
            }
            Err(e) => tracing::warn!("Failed to read stored weather: {}", e),
        }

        if self.state.cached_snapshot.is_none() {
            self.request_fresh_data();
        }
        self.invalidate();
    }

    fn attach_record_listener(&mut self) {
        if self.record_listener.is_some() {
            return;
        }
        let (tx, mut rx) = mpsc::unbounded_channel();
        self.record_listener = Some(self.client.channel().add_record_listener(tx));

        // Ends when the channel drops the listener.
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            while let Some(batch) = rx.recv().await {
                if events.send(FaceEvent::RecordsChanged(batch)).is_err() {
                    break;
                }
            }
        });
    }

    fn detach_record_listener(&mut self) {
        if let Some(id) = self.record_listener.take() {
            if !self.client.channel().remove_record_listener(id) {
                tracing::debug!("Record listener {:?} was already gone", id);
            }
        }
    }

    fn should_tick(&self) -> bool {
        self.state.is_visible && !self.state.is_ambient
    }

    fn update_redraw_timer(&mut self) {
        self.cancel_redraw_timer();
        if self.should_tick() {
            self.schedule_redraw();
        }
    }

    fn cancel_redraw_timer(&mut self) {
        if let Some(token) = self.redraw_token.take() {
            token.cancel();
        }
        self.redraw_generation = self.redraw_generation.wrapping_add(1);
    }

    fn schedule_redraw(&mut self) {
        let token = self
            .redraw_token
            .get_or_insert_with(CancellationToken::new)
            .clone();
        let generation = self.redraw_generation;
        let delay = delay_to_next_second(self.clock.now());
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    let _ = events.send(FaceEvent::RedrawTick { generation });
                }
            }
        });
    }

    fn on_redraw_tick(&mut self, generation: u64) {
        if generation != self.redraw_generation || !self.should_tick() {
            tracing::trace!("Dropping stale redraw tick");
            return;
        }
        self.invalidate();
        self.schedule_redraw();
    }
}

impl Drop for WatchFace {
    fn drop(&mut self) {
        if let Some(token) = self.redraw_token.take() {
            token.cancel();
        }
        self.detach_record_listener();
    }
}

/// Send `/latest_data` to every connected peer concurrently.
///
/// Returns `(delivered, failed)`. A failed send never stops the others.
async fn request_from_peers(channel: Arc<dyn Channel>) -> (usize, usize) {
    let peers = match channel.connected_peers().await {
        Ok(peers) => peers,
        Err(e) => {
            tracing::warn!("Failed to list connected peers: {}", e);
            return (0, 0);
        }
    };

    let sends = peers.iter().map(|peer| send_request(channel.as_ref(), peer));
    let results = join_all(sends).await;

    let delivered = results.iter().filter(|ok| **ok).count();
    (delivered, results.len() - delivered)
}

async fn send_request(channel: &dyn Channel, peer: &PeerId) -> bool {
    match channel.send_message(peer, LATEST_DATA_PATH, Vec::new()).await {
        Ok(()) => {
            tracing::debug!("Requested fresh data from {}", peer);
            true
        }
        Err(e) => {
            tracing::warn!("Data request to {} failed: {}", peer, e);
            false
        }
    }
}
