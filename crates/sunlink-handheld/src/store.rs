//! Forecast store the sync agent reads from.
//!
//! `ForecastStore` abstracts the local forecast database; `SqliteForecastStore`
//! is the SQLite implementation.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use sunlink_core::error::RusqliteErrorExt;
use sunlink_core::ForecastStoreError;
use sunlink_weather::ForecastRow;

/// Result type for forecast store operations.
pub type ForecastStoreResult<T> = Result<T, ForecastStoreError>;

/// Read access to locally cached forecasts.
///
/// Implementations don't need to be Sync; the agent serializes access
/// through a mutex and calls them off the async threads.
pub trait ForecastStore: Send {
    /// Earliest forecast for `location` dated at or after `since`.
    fn latest_forecast(
        &self,
        location: &str,
        since: DateTime<Utc>,
    ) -> ForecastStoreResult<Option<ForecastRow>>;
}

/// SQLite-based forecast storage.
pub struct SqliteForecastStore {
    conn: Connection,
}

impl SqliteForecastStore {
    /// Open (or create) the forecast database at the given path.
    pub fn new<P: AsRef<Path>>(path: P) -> ForecastStoreResult<Self> {
        let conn =
            Connection::open(path).map_err(|e| ForecastStoreError::Open(e.to_string()))?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (tests and the demo host).
    pub fn in_memory() -> ForecastStoreResult<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| ForecastStoreError::Open(e.to_string()))?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> ForecastStoreResult<()> {
        self.conn
            .execute_batch(
                r#"
            CREATE TABLE IF NOT EXISTS weather (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                location_setting TEXT NOT NULL,
                date INTEGER NOT NULL,
                weather_id INTEGER NOT NULL,
                short_desc TEXT NOT NULL,
                max_temp REAL NOT NULL,
                min_temp REAL NOT NULL,
                UNIQUE (location_setting, date) ON CONFLICT REPLACE
            );

            CREATE INDEX IF NOT EXISTS idx_weather_location_date ON weather(location_setting, date);
            "#,
            )
            .map_err(|e| e.into_store_error())?;
        Ok(())
    }

    /// Insert or replace the forecast for `location` on `date`.
    ///
    /// Rows are keyed by the UTC start of the day.
    pub fn insert_forecast(
        &self,
        location: &str,
        date: NaiveDate,
        row: &ForecastRow,
    ) -> ForecastStoreResult<()> {
        let date_ms = date.and_time(NaiveTime::MIN).and_utc().timestamp_millis();
        self.conn
            .execute(
                "INSERT INTO weather (location_setting, date, weather_id, short_desc, max_temp, min_temp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    location,
                    date_ms,
                    row.condition_code,
                    row.description,
                    row.max_temperature,
                    row.min_temperature
                ],
            )
            .map_err(|e| e.into_store_error())?;
        Ok(())
    }

    /// Delete every forecast row for `location`.
    pub fn clear_location(&self, location: &str) -> ForecastStoreResult<usize> {
        self.conn
            .execute(
                "DELETE FROM weather WHERE location_setting = ?1",
                params![location],
            )
            .map_err(|e| e.into_store_error())
    }
}

impl ForecastStore for SqliteForecastStore {
    fn latest_forecast(
        &self,
        location: &str,
        since: DateTime<Utc>,
    ) -> ForecastStoreResult<Option<ForecastRow>> {
        self.conn
            .query_row(
                "SELECT weather_id, short_desc, max_temp, min_temp FROM weather
                 WHERE location_setting = ?1 AND date >= ?2
                 ORDER BY date ASC LIMIT 1",
                params![location, since.timestamp_millis()],
                |row| {
                    Ok(ForecastRow {
                        condition_code: row.get(0)?,
                        description: row.get(1)?,
                        max_temperature: row.get(2)?,
                        min_temperature: row.get(3)?,
                    })
                },
            )
            .optional()
            .map_err(|e| e.into_store_error())
    }
}
