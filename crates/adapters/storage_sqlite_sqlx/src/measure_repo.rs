//! `SQLite` implementation of [`MeasureRepository`].

use std::future::Future;
use std::str::FromStr;

use chrono::SecondsFormat;
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use brightnest_app::ports::MeasureRepository;
use brightnest_domain::error::{BrightnestError, NotFoundError};
use brightnest_domain::id::{DeviceId, MeasureId};
use brightnest_domain::measure::Measure;
use brightnest_domain::time::{Timestamp, parse_rfc3339};

use crate::error::{StorageError, decode};

/// Fixed-width UTC form, so that text order is time order.
fn encode_time(time: Timestamp) -> String {
    time.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Wrapper for converting database rows into domain [`Measure`].
struct Wrapper(Measure);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let sensor_id: String = row.try_get("sensor_id")?;
        let value: f64 = row.try_get("value")?;
        let measure_type: String = row.try_get("measure_type")?;
        let time: String = row.try_get("time")?;

        Ok(Self(Measure {
            id: decode("id", MeasureId::from_str(&id))?,
            sensor_id: decode("sensor_id", DeviceId::from_str(&sensor_id))?,
            value,
            measure_type,
            time: decode("time", parse_rfc3339(&time))?,
        }))
    }
}

const INSERT: &str =
    "INSERT INTO measures (id, sensor_id, value, measure_type, time) VALUES (?, ?, ?, ?, ?)";
const SELECT_BY_ID: &str = "SELECT * FROM measures WHERE id = ?";
const SELECT_BY_SENSOR: &str =
    "SELECT * FROM measures WHERE sensor_id = ? ORDER BY time DESC LIMIT ?";
const UPDATE: &str = "UPDATE measures SET value = ?, measure_type = ? WHERE id = ?";

/// `SQLite`-backed measure repository.
#[derive(Debug, Clone)]
pub struct SqliteMeasureRepository {
    pool: SqlitePool,
}

impl SqliteMeasureRepository {
    /// Create a new repository using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl MeasureRepository for SqliteMeasureRepository {
    fn create(
        &self,
        measure: Measure,
    ) -> impl Future<Output = Result<Measure, BrightnestError>> + Send {
        let pool = self.pool.clone();
        async move {
            sqlx::query(INSERT)
                .bind(measure.id.to_string())
                .bind(measure.sensor_id.to_string())
                .bind(measure.value)
                .bind(&measure.measure_type)
                .bind(encode_time(measure.time))
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(measure)
        }
    }

    fn get_by_id(
        &self,
        id: MeasureId,
    ) -> impl Future<Output = Result<Option<Measure>, BrightnestError>> + Send {
        let pool = self.pool.clone();
        async move {
            let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_ID)
                .bind(id.to_string())
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(row.map(|w| w.0))
        }
    }

    fn find_by_sensor(
        &self,
        sensor_id: DeviceId,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<Measure>, BrightnestError>> + Send {
        let pool = self.pool.clone();
        async move {
            let rows: Vec<Wrapper> = sqlx::query_as(SELECT_BY_SENSOR)
                .bind(sensor_id.to_string())
                .bind(i64::from(limit))
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(rows.into_iter().map(|w| w.0).collect())
        }
    }

    fn update(
        &self,
        measure: Measure,
    ) -> impl Future<Output = Result<Measure, BrightnestError>> + Send {
        let pool = self.pool.clone();
        async move {
            let result = sqlx::query(UPDATE)
                .bind(measure.value)
                .bind(&measure.measure_type)
                .bind(measure.id.to_string())
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            if result.rows_affected() == 0 {
                return Err(NotFoundError {
                    entity: "Measure",
                    id: measure.id.to_string(),
                }
                .into());
            }
            Ok(measure)
        }
    }
}
