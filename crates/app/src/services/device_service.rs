//! Device service — the device registry.
//!
//! Keeps the persisted device rows consistent with the state of their
//! drivers. Every operation touching a driver is serialized on the
//! [`DeviceKey`] of the device and runs in a spawned task, so a caller that
//! stops waiting (timeout, dropped connection) never interrupts a sequence
//! halfway: compensation always runs to completion.

use std::future::Future;
use std::sync::Arc;

use tracing::Instrument;

use brightnest_domain::device::{Device, DeviceKey, DeviceKind};
use brightnest_domain::error::{
    BrightnestError, CompensationStage, DriverError, ManualInterventionError, NotFoundError,
};
use brightnest_domain::id::DeviceId;

use crate::driver_registry::DriverRegistry;
use crate::keyed_lock::{KeyGuard, KeyedLocks};
use crate::ports::{DeviceRepository, Driver, Page};

/// Fields to change on a device. `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceUpdate {
    pub device_type: Option<String>,
    pub name: Option<String>,
    pub custom_id: Option<String>,
}

impl DeviceUpdate {
    #[must_use]
    pub fn device_type(mut self, device_type: impl Into<String>) -> Self {
        self.device_type = Some(device_type.into());
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn custom_id(mut self, custom_id: impl Into<String>) -> Self {
        self.custom_id = Some(custom_id.into());
        self
    }

    fn apply_to(&self, device: &Device) -> Result<Device, BrightnestError> {
        let next = Device {
            id: device.id,
            kind: device.kind,
            device_type: self
                .device_type
                .clone()
                .unwrap_or_else(|| device.device_type.clone()),
            custom_id: self
                .custom_id
                .clone()
                .unwrap_or_else(|| device.custom_id.clone()),
            name: self.name.clone().unwrap_or_else(|| device.name.clone()),
        };
        next.validate()?;
        Ok(next)
    }
}

/// A persisted device its driver refused to take back at startup.
#[derive(Debug)]
pub struct ReloadFailure {
    pub device_id: DeviceId,
    pub key: DeviceKey,
    pub error: BrightnestError,
}

/// Application service owning device registration and actuation.
///
/// Cheap to clone: clones share the repository, the drivers and the locks.
pub struct DeviceService<R> {
    inner: Arc<Registry<R>>,
}

impl<R> Clone for DeviceService<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Registry<R> {
    repo: R,
    drivers: DriverRegistry,
    locks: KeyedLocks<DeviceKey>,
}

impl<R> DeviceService<R>
where
    R: DeviceRepository + Send + Sync + 'static,
{
    /// Create a new service backed by the given repository and drivers.
    pub fn new(repo: R, drivers: DriverRegistry) -> Self {
        Self {
            inner: Arc::new(Registry {
                repo,
                drivers,
                locks: KeyedLocks::new(),
            }),
        }
    }

    /// The driver table this registry dispatches to.
    #[must_use]
    pub fn drivers(&self) -> &DriverRegistry {
        &self.inner.drivers
    }

    /// Run `op` to completion in its own task, whatever happens to the caller.
    async fn detached<T, F, Fut>(&self, op: F) -> Result<T, BrightnestError>
    where
        T: Send + 'static,
        F: FnOnce(Arc<Registry<R>>) -> Fut,
        Fut: Future<Output = Result<T, BrightnestError>> + Send + 'static,
    {
        let task = op(Arc::clone(&self.inner)).in_current_span();
        tokio::spawn(task)
            .await
            .map_err(|err| BrightnestError::Internal(Box::new(err)))?
    }

    /// Register a device and bring it online with its driver.
    ///
    /// # Errors
    ///
    /// - [`BrightnestError::Validation`] if a field is empty.
    /// - [`BrightnestError::DeviceNotSupported`] if no driver handles the type.
    /// - [`BrightnestError::DeviceAlreadyExists`] if the key is taken.
    /// - [`BrightnestError::DriverIntegration`] if the driver refused the
    ///   device; the row has been deleted again.
    /// - [`BrightnestError::ManualIntervention`] if that deletion failed.
    ///
    /// None of the first three writes anything.
    #[tracing::instrument(skip(self, name))]
    pub async fn register_device(
        &self,
        kind: DeviceKind,
        device_type: &str,
        name: &str,
        custom_id: &str,
    ) -> Result<DeviceId, BrightnestError> {
        let device = Device::builder()
            .kind(kind)
            .device_type(device_type)
            .custom_id(custom_id)
            .name(name)
            .build()?;
        self.detached(move |registry| async move { registry.register(device).await })
            .await
    }

    /// Change the type, name or custom id of a device.
    ///
    /// A name-only change never reaches the driver. A custom id change calls
    /// `update` on the driver; a type change migrates the device from the old
    /// driver to the new one.
    ///
    /// # Errors
    ///
    /// - [`BrightnestError::NotFound`] if no device has this id.
    /// - [`BrightnestError::Validation`] if a new field is empty.
    /// - [`BrightnestError::DeviceNotSupported`] if no driver handles the new type.
    /// - [`BrightnestError::DeviceAlreadyExists`] if the new key is taken.
    /// - [`BrightnestError::DriverIntegration`] if a driver call failed; the
    ///   previous row and driver state have been restored.
    /// - [`BrightnestError::ManualIntervention`] if restoring failed.
    #[tracing::instrument(skip(self))]
    pub async fn update_device(
        &self,
        id: DeviceId,
        update: DeviceUpdate,
    ) -> Result<Device, BrightnestError> {
        self.detached(move |registry| async move { registry.update(id, update).await })
            .await
    }

    /// Take a device offline and delete it.
    ///
    /// # Errors
    ///
    /// - [`BrightnestError::NotFound`] if no device has this id.
    /// - [`BrightnestError::DriverIntegration`] if the driver refused; nothing
    ///   was deleted.
    /// - [`BrightnestError::Storage`] if the row could not be deleted; the
    ///   device has been re-added to its driver.
    /// - [`BrightnestError::ManualIntervention`] if re-adding failed.
    #[tracing::instrument(skip(self))]
    pub async fn remove_device(&self, id: DeviceId) -> Result<(), BrightnestError> {
        self.detached(move |registry| async move { registry.remove(id).await })
            .await
    }

    /// Send an actuation payload to an actuator through its driver.
    ///
    /// # Errors
    ///
    /// - [`BrightnestError::NotFound`] if no device has this id.
    /// - [`BrightnestError::Validation`] if the device is a sensor.
    /// - [`BrightnestError::DeviceNotSupported`] if its type lost its driver.
    /// - [`BrightnestError::DriverIntegration`] if the driver failed.
    #[tracing::instrument(skip(self, value))]
    pub async fn apply(
        &self,
        actuator_id: DeviceId,
        value: serde_json::Value,
    ) -> Result<(), BrightnestError> {
        self.detached(move |registry| async move { registry.apply(actuator_id, &value).await })
            .await
    }

    /// Re-add every persisted device to its driver.
    ///
    /// Drivers start empty, so this runs once at startup. Failures are
    /// logged and returned; they never stop the reload.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the devices cannot be listed.
    #[tracing::instrument(skip(self))]
    pub async fn reload_drivers(&self) -> Result<Vec<ReloadFailure>, BrightnestError> {
        self.detached(|registry| async move { registry.reload().await })
            .await
    }

    /// Look up a device by id, returning an error if not found.
    ///
    /// # Errors
    ///
    /// Returns [`BrightnestError::NotFound`] when no device with `id` exists,
    /// or a storage error from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn get_device(&self, id: DeviceId) -> Result<Device, BrightnestError> {
        self.inner.load(id).await
    }

    /// List devices of one role, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list_devices(
        &self,
        kind: DeviceKind,
        page: Page,
    ) -> Result<Vec<Device>, BrightnestError> {
        self.inner.repo.list(kind, page).await
    }

    /// Devices of one role sharing a driver custom id.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn find_by_custom_id(
        &self,
        kind: DeviceKind,
        custom_id: &str,
    ) -> Result<Vec<Device>, BrightnestError> {
        self.inner.repo.find_by_custom_id(kind, custom_id).await
    }
}

fn integration(device_type: &str, source: DriverError) -> BrightnestError {
    BrightnestError::DriverIntegration {
        device_type: device_type.to_string(),
        source,
    }
}

fn manual(device_id: DeviceId, stage: CompensationStage, cause: BrightnestError) -> BrightnestError {
    tracing::error!(%device_id, %stage, error = %cause, "compensation failed, manual intervention required");
    ManualInterventionError::new(device_id, stage, cause).into()
}

impl<R: DeviceRepository + Send + Sync> Registry<R> {
    async fn load(&self, id: DeviceId) -> Result<Device, BrightnestError> {
        self.repo.get_by_id(id).await?.ok_or_else(|| {
            NotFoundError {
                entity: "Device",
                id: id.to_string(),
            }
            .into()
        })
    }

    /// Load a device and hold the lock of its current key.
    ///
    /// The row is read again once the lock is held; if its key moved in the
    /// meantime the lock is released and the new key is locked instead.
    async fn lock_device(
        &self,
        id: DeviceId,
    ) -> Result<(Device, KeyGuard<'_, DeviceKey>), BrightnestError> {
        loop {
            let seen = self.load(id).await?;
            let guard = self.locks.lock(seen.key()).await;
            let current = self.load(id).await?;
            if current.key() == seen.key() {
                return Ok((current, guard));
            }
        }
    }

    async fn register(&self, device: Device) -> Result<DeviceId, BrightnestError> {
        let driver = self.drivers.get(device.kind, &device.device_type)?;
        let key = device.key();
        let _guard = self.locks.lock(key.clone()).await;

        let device = self.repo.create(device).await?;
        if let Err(source) = driver.add(&device.custom_id).await {
            tracing::warn!(device_id = %device.id, %key, error = %source, "driver rejected device, discarding row");
            let failure = integration(&device.device_type, source);
            if let Err(cause) = self.repo.delete(device.id).await {
                return Err(manual(device.id, CompensationStage::DiscardRegistration, cause));
            }
            return Err(failure);
        }

        tracing::info!(device_id = %device.id, %key, driver = driver.name(), "device registered");
        Ok(device.id)
    }

    async fn update(&self, id: DeviceId, update: DeviceUpdate) -> Result<Device, BrightnestError> {
        loop {
            let seen = self.load(id).await?;
            let wanted = update.apply_to(&seen)?;
            self.drivers.get(wanted.kind, &wanted.device_type)?;

            let _guards = self.locks.lock_all(vec![seen.key(), wanted.key()]).await;
            let current = self.load(id).await?;
            if current.key() != seen.key() {
                continue;
            }
            let next = update.apply_to(&current)?;
            return self.update_locked(current, next).await;
        }
    }

    async fn update_locked(&self, current: Device, next: Device) -> Result<Device, BrightnestError> {
        if current.key() == next.key() {
            return self.repo.update(next).await;
        }

        let new_driver = self.drivers.get(next.kind, &next.device_type)?;
        let old_driver = if current.device_type == next.device_type {
            None
        } else {
            let old = self.drivers.get(current.kind, &current.device_type).ok();
            if old.is_none() {
                tracing::warn!(device_id = %current.id, device_type = %current.device_type, "previous type has no driver, skipping its removal");
            }
            Some(old)
        };

        let updated = self.repo.update(next.clone()).await?;

        match old_driver {
            None => {
                if let Err(source) = new_driver.update(&current.custom_id, &next.custom_id).await {
                    return self.revert(current, integration(&next.device_type, source)).await;
                }
            }
            Some(old_driver) => {
                self.migrate(&current, &next, &new_driver, old_driver.as_deref())
                    .await?;
            }
        }

        tracing::info!(device_id = %updated.id, from = %current.key(), to = %updated.key(), "device updated");
        Ok(updated)
    }

    /// Move a device to the driver of its new type: add it there first, then
    /// remove it from the old one, undoing the addition if the removal fails.
    async fn migrate(
        &self,
        current: &Device,
        next: &Device,
        new_driver: &Arc<dyn Driver>,
        old_driver: Option<&dyn Driver>,
    ) -> Result<(), BrightnestError> {
        if let Err(source) = new_driver.add(&next.custom_id).await {
            return self
                .revert(current.clone(), integration(&next.device_type, source))
                .await;
        }
        let Some(old_driver) = old_driver else {
            return Ok(());
        };
        if let Err(source) = old_driver.remove(&current.custom_id).await {
            if let Err(undo) = new_driver.remove(&next.custom_id).await {
                return Err(manual(
                    current.id,
                    CompensationStage::RollbackMigration,
                    integration(&next.device_type, undo),
                ));
            }
            return self
                .revert(current.clone(), integration(&current.device_type, source))
                .await;
        }
        Ok(())
    }

    /// Restore the previous row after a failed driver step and report `failure`.
    async fn revert<T>(&self, previous: Device, failure: BrightnestError) -> Result<T, BrightnestError> {
        let device_id = previous.id;
        tracing::warn!(%device_id, error = %failure, "driver update failed, restoring previous row");
        match self.repo.update(previous).await {
            Ok(_) => Err(failure),
            Err(cause) => Err(manual(device_id, CompensationStage::RevertUpdate, cause)),
        }
    }

    async fn remove(&self, id: DeviceId) -> Result<(), BrightnestError> {
        let (device, _guard) = self.lock_device(id).await?;
        let key = device.key();

        let driver = match self.drivers.get(device.kind, &device.device_type) {
            Ok(driver) => Some(driver),
            Err(_) => {
                tracing::warn!(device_id = %id, %key, "type has no driver, deleting row only");
                None
            }
        };

        if let Some(driver) = &driver {
            driver
                .remove(&device.custom_id)
                .await
                .map_err(|source| integration(&device.device_type, source))?;
        }

        if let Err(failure) = self.repo.delete(id).await {
            tracing::warn!(device_id = %id, %key, error = %failure, "row delete failed, restoring driver");
            if let Some(driver) = &driver
                && let Err(source) = driver.add(&device.custom_id).await
            {
                return Err(manual(
                    id,
                    CompensationStage::RestoreDriver,
                    integration(&device.device_type, source),
                ));
            }
            return Err(failure);
        }

        tracing::info!(device_id = %id, %key, "device removed");
        Ok(())
    }

    async fn apply(&self, id: DeviceId, value: &serde_json::Value) -> Result<(), BrightnestError> {
        let (device, _guard) = self.lock_device(id).await?;
        device.expect_kind(DeviceKind::Actuator)?;
        let driver = self.drivers.get(device.kind, &device.device_type)?;
        driver
            .apply(&device.custom_id, value)
            .await
            .map_err(|source| integration(&device.device_type, source))?;
        tracing::debug!(device_id = %id, key = %device.key(), "payload applied");
        Ok(())
    }

    async fn reload(&self) -> Result<Vec<ReloadFailure>, BrightnestError> {
        let devices = self.repo.get_all().await?;
        let mut failures = Vec::new();
        let mut reloaded = 0_usize;

        for device in devices {
            let key = device.key();
            let _guard = self.locks.lock(key.clone()).await;
            let outcome = match self.drivers.get(device.kind, &device.device_type) {
                Ok(driver) => match driver.add(&device.custom_id).await {
                    Ok(()) | Err(DriverError::AlreadyRegistered(_)) => Ok(()),
                    Err(source) => Err(integration(&device.device_type, source)),
                },
                Err(err) => Err(err),
            };
            match outcome {
                Ok(()) => reloaded += 1,
                Err(error) => {
                    tracing::warn!(device_id = %device.id, %key, %error, "could not reload device into its driver");
                    failures.push(ReloadFailure {
                        device_id: device.id,
                        key,
                        error,
                    });
                }
            }
        }

        tracing::info!(reloaded, failed = failures.len(), "drivers reloaded");
        Ok(failures)
    }
}
