use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use parking_lot::Mutex;
use sunlink_channel::{Channel, ChannelClient, LoopbackConfig, LoopbackNetwork};
use sunlink_core::Config;
use sunlink_handheld::{
    start_of_utc_day, ForecastStore, SharedForecastStore, SqliteForecastStore, StaticPreferences,
    SyncAgent, SyncTrigger,
};
use sunlink_wear::{BundledIcons, FaceOptions, RecordingCanvas, SystemClock, WatchFace};
use sunlink_weather::ForecastRow;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Runs both device roles in one process and logs what the face draws.
#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    sunlink_core::init_with_filter(&config.logging.filter)?;

    let validation = config.validate();
    for warning in &validation.warnings {
        tracing::warn!("Config warning: {}", warning);
    }
    if !validation.is_valid() {
        anyhow::bail!(
            "Configuration validation failed: {}",
            validation.error_summary()
        );
    }

    tracing::info!("Sunlink demo started");
    tracing::info!("Config directory: {}", config.config_dir.display());

    let shutdown = CancellationToken::new();
    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, shutting down");
            ctrl_c.cancel();
        }
    });

    // Handheld side
    let db_path = config.forecast_db_path();
    let store = SqliteForecastStore::new(&db_path)
        .with_context(|| format!("Failed to open forecast store at {}", db_path.display()))?;
    seed_forecast(&store, &config.handheld.location, sample_row(800, "Clear", 25.0, 15.0))?;
    let store = Arc::new(Mutex::new(store));

    let network = LoopbackNetwork::new(LoopbackConfig::from(&config.transport));
    let phone: Arc<dyn Channel> = network.node("phone");
    let shared: SharedForecastStore = store.clone();
    let agent = SyncAgent::new(
        Arc::new(ChannelClient::new(phone)),
        shared,
        Arc::new(StaticPreferences::from(&config.handheld)),
    );
    let (triggers, trigger_rx) = mpsc::channel(16);
    let agent_task = tokio::spawn(agent.run(trigger_rx, shutdown.clone()));

    // Wearable side
    let watch: Arc<dyn Channel> = network.node("watch");
    let mut face = WatchFace::new(
        Arc::new(ChannelClient::new(watch)),
        Arc::new(SystemClock),
        Box::new(BundledIcons),
        FaceOptions::from(&config.wear),
    );
    let mut canvas = RecordingCanvas::new(320.0, 320.0);

    face.on_visibility_changed(true);
    run_face(&mut face, &mut canvas, Duration::from_secs(3), &shutdown).await;

    face.on_ambient_mode_changed(true);
    run_face(&mut face, &mut canvas, Duration::from_secs(2), &shutdown).await;
    face.on_ambient_mode_changed(false);

    seed_forecast(
        &store.lock(),
        &config.handheld.location,
        sample_row(501, "Moderate rain", 14.5, 9.0),
    )?;
    triggers
        .send(SyncTrigger::ForecastChanged)
        .await
        .context("Sync agent stopped early")?;
    run_face(&mut face, &mut canvas, Duration::from_secs(2), &shutdown).await;

    face.on_visibility_changed(false);
    face.process_pending();
    shutdown.cancel();
    agent_task.await.context("Sync agent task failed")?;

    tracing::info!("Sunlink demo finished after {} frame(s)", canvas.frames());
    Ok(())
}

fn sample_row(code: i32, description: &str, max: f64, min: f64) -> ForecastRow {
    ForecastRow {
        condition_code: code,
        description: description.to_string(),
        max_temperature: max,
        min_temperature: min,
    }
}

/// Write today's forecast, replacing any earlier row for the same day.
fn seed_forecast(store: &SqliteForecastStore, location: &str, row: ForecastRow) -> Result<()> {
    let today = Utc::now();
    if let Some(existing) = store.latest_forecast(location, start_of_utc_day(today))? {
        tracing::debug!("Replacing forecast '{}'", existing.description);
    }
    store.insert_forecast(location, today.date_naive(), &row)?;
    tracing::info!("Seeded forecast for {}: {}", location, row.description);
    Ok(())
}

/// Drive the face for `duration`, drawing whenever it asks for it.
async fn run_face(
    face: &mut WatchFace,
    canvas: &mut RecordingCanvas,
    duration: Duration,
    shutdown: &CancellationToken,
) {
    let deadline = Instant::now() + duration;
    loop {
        if face.needs_redraw() {
            let frame = face.draw(canvas);
            tracing::info!("Frame: {}", frame.texts().join(" | "));
        }

        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep_until(deadline) => break,
            event = face.next_event() => match event {
                Some(event) => face.handle_event(event),
                None => break,
            },
        }
    }
}
