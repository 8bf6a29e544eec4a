//! Sharing one gauge between several tasks
//!
//! Block selection and config mode are per-device state, so a sequence like
//! "enter config, read block, write block, exit" must not be interleaved with
//! anything else addressed to the same gauge, not even a plain read. Every
//! driver method takes `&mut self`, which already guarantees that for a single
//! owner. When the gauge has to be reachable from more than one task, wrap it
//! here and hold the guard for the whole sequence:
//!
//! ```rust,ignore
//! let mut gauge = shared.lock().await;
//! gauge.enter_config(true).await?;
//! gauge.set_capacity(1200).await?;
//! gauge.set_terminate_voltage_min(3000).await?;
//! gauge.exit_config(true).await?;
//! ```

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::{Mutex, MutexGuard, TryLockError};

use crate::Bq27441;

pub struct SharedGauge<M: RawMutex, T, D> {
    gauge: Mutex<M, Bq27441<T, D>>,
}

impl<M: RawMutex, T, D> SharedGauge<M, T, D> {
    pub const fn new(gauge: Bq27441<T, D>) -> Self {
        Self {
            gauge: Mutex::new(gauge),
        }
    }

    /// Waits until every other user is done with the gauge
    pub async fn lock(&self) -> MutexGuard<'_, M, Bq27441<T, D>> {
        self.gauge.lock().await
    }

    /// Fails right away if another task is in the middle of a sequence
    pub fn try_lock(&self) -> Result<MutexGuard<'_, M, Bq27441<T, D>>, TryLockError> {
        self.gauge.try_lock()
    }

    pub fn into_inner(self) -> Bq27441<T, D> {
        self.gauge.into_inner()
    }
}
