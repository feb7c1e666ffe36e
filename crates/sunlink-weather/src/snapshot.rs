use serde::{Deserialize, Serialize};
use sunlink_channel::{DataMap, PutRecordRequest, Record};
use sunlink_core::SchemaError;

/// Path of the replicated weather record.
pub const WEATHER_PATH: &str = "/weather";

/// Path of the one-shot message asking the handheld for a fresh record.
pub const LATEST_DATA_PATH: &str = "/latest_data";

pub const WEATHER_ID_KEY: &str = "weather_id";
pub const MAX_TEMP_KEY: &str = "max_temp";
pub const MIN_TEMP_KEY: &str = "min_temp";
pub const DESCRIPTION_KEY: &str = "description";
pub const IS_METRIC_KEY: &str = "is_metric";

/// One row of the handheld's forecast store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRow {
    pub condition_code: i32,
    pub description: String,
    /// Celsius
    pub max_temperature: f64,
    /// Celsius
    pub min_temperature: f64,
}

/// The weather summary exchanged between the devices.
///
/// Snapshots are never mutated after construction; a newer one replaces the
/// whole value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub condition_code: i32,
    pub description: String,
    /// Celsius
    pub max_temperature: f64,
    /// Celsius
    pub min_temperature: f64,
    /// Display-unit hint set by the sender.
    pub is_metric_preferred: bool,
}

impl WeatherSnapshot {
    pub fn from_forecast(row: ForecastRow, is_metric_preferred: bool) -> Self {
        Self {
            condition_code: row.condition_code,
            description: row.description,
            max_temperature: row.max_temperature,
            min_temperature: row.min_temperature,
            is_metric_preferred,
        }
    }

    pub fn to_data_map(&self) -> DataMap {
        let mut map = DataMap::new();
        map.put_int(WEATHER_ID_KEY, self.condition_code)
            .put_string(DESCRIPTION_KEY, self.description.clone())
            .put_double(MAX_TEMP_KEY, self.max_temperature)
            .put_double(MIN_TEMP_KEY, self.min_temperature)
            .put_bool(IS_METRIC_KEY, self.is_metric_preferred);
        map
    }

    pub fn from_data_map(map: &DataMap) -> Result<Self, SchemaError> {
        Ok(Self {
            condition_code: map.get_int(WEATHER_ID_KEY)?,
            description: map.get_string(DESCRIPTION_KEY)?,
            max_temperature: map.get_double(MAX_TEMP_KEY)?,
            min_temperature: map.get_double(MIN_TEMP_KEY)?,
            is_metric_preferred: map.get_bool(IS_METRIC_KEY)?,
        })
    }

    /// Urgent put request for the weather path.
    pub fn to_put_request(&self) -> PutRecordRequest {
        PutRecordRequest::new(WEATHER_PATH, self.to_data_map()).urgent()
    }

    /// Decode a record, rejecting records stored under any other path.
    pub fn from_record(record: &Record) -> Result<Self, SchemaError> {
        if record.path != WEATHER_PATH {
            return Err(SchemaError::WrongPath(record.path.clone()));
        }
        Self::from_data_map(&record.data)
    }
}
