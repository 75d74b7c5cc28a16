//! Per-slot session records.
//!
//! Each slot holds two independently locked parts: the public record
//! (configuration, counters, busy flag) and the backend-private resources
//! (a connection, a loopback buffer). The record lock is only ever held for
//! short bookkeeping, so [`SessionStore::status`] answers while an operation
//! is in flight. The resources lock is held by the operation that set the
//! busy flag.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::config::SpiConfig;
use crate::device::{DeviceId, DEVICE_COUNT};
use crate::error::{HalError, Result};
use crate::status::{DeviceState, DeviceStatus};

#[derive(Debug)]
struct Record {
    config: SpiConfig,
    status: DeviceStatus,
}

struct Slot<T> {
    record: Mutex<Option<Record>>,
    resources: Mutex<Option<T>>,
}

impl<T> Slot<T> {
    fn empty() -> Self {
        Self {
            record: Mutex::new(None),
            resources: Mutex::new(None),
        }
    }
}

fn lock<V>(mutex: &Mutex<V>) -> MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Fixed arena of [`DEVICE_COUNT`] session slots, generic over the
/// backend-private resource type `T`.
pub struct SessionStore<T> {
    slots: [Slot<T>; DEVICE_COUNT],
}

impl<T> Default for SessionStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SessionStore<T> {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| Slot::empty()),
        }
    }

    fn slot(&self, device: DeviceId) -> &Slot<T> {
        &self.slots[device.index()]
    }

    /// Move a slot from Reset to Ready.
    ///
    /// `open` builds the backend-private resources without any slot lock
    /// held, so [`SessionStore::status`] keeps answering while it runs. If it
    /// fails the slot stays in Reset. A slot that is already initialized, or
    /// that another `init` filled while `open` ran, yields [`HalError::Busy`].
    pub fn init(
        &self,
        device: DeviceId,
        config: &SpiConfig,
        open: impl FnOnce(&SpiConfig) -> Result<T>,
    ) -> Result<()> {
        let slot = self.slot(device);
        if lock(&slot.record).is_some() {
            return Err(HalError::Busy);
        }

        let resources = open(config)?;

        let mut record = lock(&slot.record);
        if record.is_some() {
            debug!(%device, "slot initialized concurrently, dropping new resources");
            return Err(HalError::Busy);
        }
        *lock(&slot.resources) = Some(resources);
        *record = Some(Record {
            config: *config,
            status: DeviceStatus::ready(),
        });
        debug!(%device, "session opened");
        Ok(())
    }

    /// Discard the slot's record and hand back its resources for teardown.
    ///
    /// Waits for an in-flight operation to release the resources.
    pub fn deinit(&self, device: DeviceId) -> Result<(Option<T>, DeviceStatus)> {
        let slot = self.slot(device);
        let record = lock(&slot.record)
            .take()
            .ok_or(HalError::NotInitialized)?;
        let resources = lock(&slot.resources).take();
        debug!(%device, "session closed");
        Ok((resources, record.status))
    }

    /// Current status. Never blocks on an in-flight operation.
    pub fn status(&self, device: DeviceId) -> Result<DeviceStatus> {
        lock(&self.slot(device).record)
            .as_ref()
            .map(|record| record.status)
            .ok_or(HalError::NotInitialized)
    }

    /// Current configuration.
    pub fn config(&self, device: DeviceId) -> Result<SpiConfig> {
        lock(&self.slot(device).record)
            .as_ref()
            .map(|record| record.config)
            .ok_or(HalError::NotInitialized)
    }

    pub fn is_initialized(&self, device: DeviceId) -> bool {
        lock(&self.slot(device).record).is_some()
    }

    /// Claim the slot for one operation.
    ///
    /// Fails with [`HalError::NotInitialized`] in Reset and [`HalError::Busy`]
    /// when another operation holds the slot. The busy flag is cleared when
    /// the returned [`Operation`] drops, on every exit path.
    pub fn begin(&self, device: DeviceId) -> Result<Operation<'_, T>> {
        let slot = self.slot(device);
        let config = {
            let mut guard = lock(&slot.record);
            let record = guard.as_mut().ok_or(HalError::NotInitialized)?;
            if record.status.busy {
                return Err(HalError::Busy);
            }
            record.status.busy = true;
            record.status.state = DeviceState::Busy;
            record.config
        };

        Ok(Operation {
            device,
            record: &slot.record,
            resources: Some(lock(&slot.resources)),
            config,
            tx: 0,
            rx: 0,
            failed: false,
            new_config: None,
        })
    }
}

/// Exclusive claim on one slot for the duration of a single operation.
///
/// Counter and configuration changes are staged here and folded into the
/// record when the claim drops.
pub struct Operation<'a, T> {
    device: DeviceId,
    record: &'a Mutex<Option<Record>>,
    resources: Option<MutexGuard<'a, Option<T>>>,
    config: SpiConfig,
    tx: u32,
    rx: u32,
    failed: bool,
    new_config: Option<SpiConfig>,
}

impl<T> Operation<'_, T> {
    pub fn device(&self) -> DeviceId {
        self.device
    }

    /// Configuration in effect when the operation began.
    pub fn config(&self) -> &SpiConfig {
        &self.config
    }

    /// Backend-private resources of the slot.
    ///
    /// [`HalError::NotInitialized`] if a concurrent deinit already took them.
    pub fn resources(&mut self) -> Result<&mut T> {
        self.resources
            .as_mut()
            .and_then(|guard| guard.as_mut())
            .ok_or(HalError::NotInitialized)
    }

    pub fn add_tx(&mut self, bytes: usize) {
        self.tx = self.tx.saturating_add(saturate(bytes));
    }

    pub fn add_rx(&mut self, bytes: usize) {
        self.rx = self.rx.saturating_add(saturate(bytes));
    }

    /// Count this operation as failed.
    pub fn mark_failed(&mut self) {
        self.failed = true;
    }

    /// Replace the slot configuration when the operation completes.
    pub fn replace_config(&mut self, config: SpiConfig) {
        self.config = config;
        self.new_config = Some(config);
    }

    /// Run `f`, marking the operation failed if it returns an error.
    pub fn track<R>(&mut self, f: impl FnOnce(&mut Self) -> Result<R>) -> Result<R> {
        let result = f(self);
        if result.is_err() {
            self.mark_failed();
        }
        result
    }
}

fn saturate(bytes: usize) -> u32 {
    u32::try_from(bytes).unwrap_or(u32::MAX)
}

impl<T> Drop for Operation<'_, T> {
    fn drop(&mut self) {
        // Release resources before touching the record; deinit takes them in
        // the opposite order.
        drop(self.resources.take());

        let mut guard = lock(self.record);
        if let Some(record) = guard.as_mut() {
            let status = &mut record.status;
            status.tx_count = status.tx_count.saturating_add(self.tx);
            status.rx_count = status.rx_count.saturating_add(self.rx);
            if self.failed {
                status.error_count = status.error_count.saturating_add(1);
            }
            status.busy = false;
            status.state = DeviceState::Ready;
            if let Some(config) = self.new_config.take() {
                record.config = config;
            }
        }
    }
}
