//! `SQLite` implementation of [`DeviceRepository`].

use std::future::Future;
use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use brightnest_app::ports::{DeviceRepository, Page};
use brightnest_domain::device::{Device, DeviceKind};
use brightnest_domain::error::{BrightnestError, NotFoundError};
use brightnest_domain::id::DeviceId;

use crate::error::{StorageError, decode};

/// Wrapper for converting database rows into domain [`Device`].
struct Wrapper(Device);

impl Wrapper {
    fn maybe(value: Option<Self>) -> Option<Device> {
        value.map(|w| w.0)
    }

    fn all(values: Vec<Self>) -> Vec<Device> {
        values.into_iter().map(|w| w.0).collect()
    }
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let kind: String = row.try_get("kind")?;
        let device_type: String = row.try_get("device_type")?;
        let custom_id: String = row.try_get("custom_id")?;
        let name: String = row.try_get("name")?;

        Ok(Self(Device {
            id: decode("id", DeviceId::from_str(&id))?,
            kind: decode("kind", DeviceKind::from_str(&kind))?,
            device_type,
            custom_id,
            name,
        }))
    }
}

/// Map a failed write, turning a key collision into its domain error.
fn write_error(err: sqlx::Error, device: &Device) -> BrightnestError {
    let err = StorageError::from(err);
    if err.is_unique_violation() {
        BrightnestError::DeviceAlreadyExists {
            kind: device.kind,
            device_type: device.device_type.clone(),
            custom_id: device.custom_id.clone(),
        }
    } else {
        err.into()
    }
}

const INSERT: &str =
    "INSERT INTO devices (id, kind, device_type, custom_id, name) VALUES (?, ?, ?, ?, ?)";
const SELECT_BY_ID: &str = "SELECT * FROM devices WHERE id = ?";
const SELECT_BY_KIND: &str =
    "SELECT * FROM devices WHERE kind = ? ORDER BY name, id LIMIT ? OFFSET ?";
const SELECT_ALL: &str = "SELECT * FROM devices ORDER BY kind, name, id";
const SELECT_BY_CUSTOM_ID: &str =
    "SELECT * FROM devices WHERE kind = ? AND custom_id = ? ORDER BY device_type";
const UPDATE: &str =
    "UPDATE devices SET device_type = ?, custom_id = ?, name = ? WHERE id = ?";
const DELETE_BY_ID: &str = "DELETE FROM devices WHERE id = ?";

/// `SQLite`-backed device repository.
#[derive(Debug, Clone)]
pub struct SqliteDeviceRepository {
    pool: SqlitePool,
}

impl SqliteDeviceRepository {
    /// Create a new repository using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl DeviceRepository for SqliteDeviceRepository {
    fn create(&self, device: Device) -> impl Future<Output = Result<Device, BrightnestError>> + Send {
        let pool = self.pool.clone();
        async move {
            sqlx::query(INSERT)
                .bind(device.id.to_string())
                .bind(device.kind.as_str())
                .bind(&device.device_type)
                .bind(&device.custom_id)
                .bind(&device.name)
                .execute(&pool)
                .await
                .map_err(|err| write_error(err, &device))?;

            Ok(device)
        }
    }

    fn get_by_id(
        &self,
        id: DeviceId,
    ) -> impl Future<Output = Result<Option<Device>, BrightnestError>> + Send {
        let pool = self.pool.clone();
        async move {
            let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_ID)
                .bind(id.to_string())
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(Wrapper::maybe(row))
        }
    }

    fn list(
        &self,
        kind: DeviceKind,
        page: Page,
    ) -> impl Future<Output = Result<Vec<Device>, BrightnestError>> + Send {
        let pool = self.pool.clone();
        async move {
            let rows: Vec<Wrapper> = sqlx::query_as(SELECT_BY_KIND)
                .bind(kind.as_str())
                .bind(page.limit.map_or(-1, i64::from))
                .bind(i64::from(page.offset))
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(Wrapper::all(rows))
        }
    }

    fn get_all(&self) -> impl Future<Output = Result<Vec<Device>, BrightnestError>> + Send {
        let pool = self.pool.clone();
        async move {
            let rows: Vec<Wrapper> = sqlx::query_as(SELECT_ALL)
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(Wrapper::all(rows))
        }
    }

    fn find_by_custom_id(
        &self,
        kind: DeviceKind,
        custom_id: &str,
    ) -> impl Future<Output = Result<Vec<Device>, BrightnestError>> + Send {
        let pool = self.pool.clone();
        let custom_id = custom_id.to_string();
        async move {
            let rows: Vec<Wrapper> = sqlx::query_as(SELECT_BY_CUSTOM_ID)
                .bind(kind.as_str())
                .bind(&custom_id)
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(Wrapper::all(rows))
        }
    }

    fn update(&self, device: Device) -> impl Future<Output = Result<Device, BrightnestError>> + Send {
        let pool = self.pool.clone();
        async move {
            let result = sqlx::query(UPDATE)
                .bind(&device.device_type)
                .bind(&device.custom_id)
                .bind(&device.name)
                .bind(device.id.to_string())
                .execute(&pool)
                .await
                .map_err(|err| write_error(err, &device))?;

            if result.rows_affected() == 0 {
                return Err(NotFoundError {
                    entity: "Device",
                    id: device.id.to_string(),
                }
                .into());
            }
            Ok(device)
        }
    }

    fn delete(&self, id: DeviceId) -> impl Future<Output = Result<(), BrightnestError>> + Send {
        let pool = self.pool.clone();
        async move {
            sqlx::query(DELETE_BY_ID)
                .bind(id.to_string())
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Config;

    async fn setup() -> SqliteDeviceRepository {
        let db = Config {
            database_url: "sqlite::memory:".to_string(),
        }
        .build()
        .await
        .unwrap();
        SqliteDeviceRepository::new(db.pool().clone())
    }

    fn device(kind: DeviceKind, device_type: &str, custom_id: &str, name: &str) -> Device {
        Device::builder()
            .kind(kind)
            .device_type(device_type)
            .custom_id(custom_id)
            .name(name)
            .build()
            .unwrap()
    }

    fn lamp() -> Device {
        device(DeviceKind::Actuator, "hue", "BB22", "Lamp")
    }

    #[tokio::test]
    async fn should_create_and_retrieve_device_when_valid() {
        let repo = setup().await;
        let created = repo.create(lamp()).await.unwrap();

        let fetched = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn should_return_none_when_device_not_found() {
        let repo = setup().await;
        let result = repo.get_by_id(DeviceId::new()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn should_return_already_exists_when_key_taken() {
        let repo = setup().await;
        repo.create(lamp()).await.unwrap();

        let err = repo.create(lamp()).await.unwrap_err();

        assert!(matches!(
            err,
            BrightnestError::DeviceAlreadyExists { kind: DeviceKind::Actuator, ref custom_id, .. }
                if custom_id == "BB22"
        ));
        assert_eq!(repo.get_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn should_accept_same_custom_id_when_kind_differs() {
        let repo = setup().await;
        repo.create(lamp()).await.unwrap();
        repo.create(device(DeviceKind::Sensor, "hue", "BB22", "Motion"))
            .await
            .unwrap();

        assert_eq!(repo.get_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn should_page_devices_of_one_kind_by_name() {
        let repo = setup().await;
        for name in ["Charlie", "Alpha", "Bravo"] {
            repo.create(device(DeviceKind::Actuator, "hue", name, name))
                .await
                .unwrap();
        }
        repo.create(device(DeviceKind::Sensor, "sunspot", "S1", "Aardvark"))
            .await
            .unwrap();

        let all = repo.list(DeviceKind::Actuator, Page::all()).await.unwrap();
        let names: Vec<_> = all.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "Bravo", "Charlie"]);

        let second = repo.list(DeviceKind::Actuator, Page::new(1, 1)).await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].name, "Bravo");
    }

    #[tokio::test]
    async fn should_find_every_type_sharing_a_custom_id() {
        let repo = setup().await;
        repo.create(device(DeviceKind::Sensor, "sunspot", "AA11", "Probe"))
            .await
            .unwrap();
        repo.create(device(DeviceKind::Sensor, "openweathermap", "AA11", "Weather"))
            .await
            .unwrap();
        repo.create(device(DeviceKind::Actuator, "hue", "AA11", "Lamp"))
            .await
            .unwrap();

        let sensors = repo
            .find_by_custom_id(DeviceKind::Sensor, "AA11")
            .await
            .unwrap();

        let types: Vec<_> = sensors.iter().map(|d| d.device_type.as_str()).collect();
        assert_eq!(types, vec!["openweathermap", "sunspot"]);
    }

    #[tokio::test]
    async fn should_update_device_when_exists() {
        let repo = setup().await;
        let mut device = repo.create(lamp()).await.unwrap();

        device.custom_id = "CC33".to_string();
        device.name = "Kitchen".to_string();
        repo.update(device.clone()).await.unwrap();

        let fetched = repo.get_by_id(device.id).await.unwrap().unwrap();
        assert_eq!(fetched, device);
    }

    #[tokio::test]
    async fn should_return_already_exists_when_update_collides() {
        let repo = setup().await;
        let mut first = repo.create(lamp()).await.unwrap();
        repo.create(device(DeviceKind::Actuator, "hue", "CC33", "Other"))
            .await
            .unwrap();

        first.custom_id = "CC33".to_string();
        let err = repo.update(first).await.unwrap_err();

        assert!(matches!(err, BrightnestError::DeviceAlreadyExists { .. }));
    }

    #[tokio::test]
    async fn should_return_not_found_when_updating_missing_device() {
        let repo = setup().await;
        let err = repo.update(lamp()).await.unwrap_err();
        assert!(matches!(err, BrightnestError::NotFound(_)));
    }

    #[tokio::test]
    async fn should_delete_device() {
        let repo = setup().await;
        let device = repo.create(lamp()).await.unwrap();

        repo.delete(device.id).await.unwrap();

        assert!(repo.get_by_id(device.id).await.unwrap().is_none());
    }
}
