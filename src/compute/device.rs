// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Cross-platform device wrappers, compute edition.
//!
//! A [BoundDevice] is the context object every other type in the crate is created from.
//! There is no global device; construct one, then pass it around (it is cheap to clone).
//!
//! ```no_run
//! # test_executors::sleep_on(async {
//! use kernel_dispatch::compute::device::{BoundDevice, DeviceOptions};
//! let device = BoundDevice::headless(DeviceOptions::default()).await.expect("no device");
//! assert!(!device.is_lost());
//! # });
//! ```
use std::fmt::Formatter;
use std::sync::Arc;

use crate::entry_point::{EntryPoint, EntryPointError};
use crate::imp;

/// Adapter preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PowerPreference {
    /// Let the backend decide.
    #[default]
    None,
    LowPower,
    HighPerformance,
}

/// Configuration for acquiring a device.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceOptions {
    pub power_preference: PowerPreference,
    /// Try a software adapter when no hardware adapter is available.
    pub allow_fallback_adapter: bool,
    /// Debug label forwarded to the device.
    pub label: String,
}

impl Default for DeviceOptions {
    fn default() -> Self {
        DeviceOptions {
            power_preference: PowerPreference::default(),
            allow_fallback_adapter: true,
            label: "kernel_dispatch".to_string(),
        }
    }
}

///Cross-platform unbound device, compute edition
#[derive(Debug)]
pub struct UnboundDevice(pub(crate) crate::imp::UnboundDevice, pub(crate) String);
impl UnboundDevice {
    ///Pick an adapter matching `options`
    pub async fn pick(
        entry_point: &EntryPoint,
        options: &DeviceOptions,
    ) -> Result<UnboundDevice, PickError> {
        crate::imp::UnboundDevice::pick(entry_point, options)
            .await
            .map(|u| UnboundDevice(u, options.label.clone()))
            .map_err(PickError)
    }
}

#[derive(Debug)]
pub struct PickError(imp::Error);
impl std::fmt::Display for PickError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}
impl std::error::Error for PickError {}

///Cross-platform bound device, compute edition
#[derive(Debug, Clone)]
pub struct BoundDevice(pub(crate) imp::BoundDevice, Arc<EntryPoint>);

impl AsRef<imp::BoundDevice> for BoundDevice {
    fn as_ref(&self) -> &imp::BoundDevice {
        &self.0
    }
}

#[derive(Debug)]
pub struct BindError(imp::Error);
impl std::fmt::Display for BindError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}
impl std::error::Error for BindError {}

/// Any failure while acquiring a device headlessly.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum AcquireError {
    #[error("Can't create entry point: {0}")]
    EntryPoint(#[from] EntryPointError),
    #[error("Can't pick adapter: {0}")]
    Pick(#[from] PickError),
    #[error("Can't bind device: {0}")]
    Bind(#[from] BindError),
}

impl BoundDevice {
    /// Opens the device and queue on a picked adapter.
    pub async fn bind(
        unbound_device: UnboundDevice,
        entry_point: Arc<EntryPoint>,
    ) -> Result<Self, BindError> {
        let bind = crate::imp::BoundDevice::bind(unbound_device)
            .await
            .map_err(BindError)?;
        Ok(Self(bind, entry_point))
    }

    /// Creates an entry point, picks an adapter and binds it.
    pub async fn headless(options: DeviceOptions) -> Result<Self, AcquireError> {
        let entry_point = Arc::new(EntryPoint::new().await?);
        let unbound = UnboundDevice::pick(&entry_point, &options).await?;
        Ok(Self::bind(unbound, entry_point).await?)
    }

    /// Whether the device has been lost.  Once true, every operation fails with
    /// [crate::Error::DeviceLost].
    pub fn is_lost(&self) -> bool {
        self.0.lost_reason().is_some()
    }

    /// The backend's description of the loss, if any.
    pub fn lost_reason(&self) -> Option<String> {
        self.0.lost_reason()
    }

    /// The largest workgroup count accepted in any one dimension.
    pub fn max_workgroups_per_dimension(&self) -> u32 {
        self.0.limits().max_compute_workgroups_per_dimension
    }

    /// How many storage buffers one kernel may bind.
    pub fn max_storage_buffers_per_stage(&self) -> u32 {
        self.0.limits().max_storage_buffers_per_shader_stage
    }

    /// The largest buffer, in bytes, the device will allocate.
    pub fn max_buffer_size(&self) -> u64 {
        self.0.limits().max_buffer_size
    }

    /// Destroys the device ahead of its last handle being dropped.
    ///
    /// The device is lost from here on: every resource created from it is invalid and every
    /// later operation fails with [crate::Error::DeviceLost].
    pub fn destroy(&self) {
        logwise::info_sync!("Destroying device");
        self.0.destroy();
    }

    pub(crate) fn check_lost(&self) -> Result<(), crate::Error> {
        match self.0.lost_reason() {
            Some(reason) => Err(crate::Error::DeviceLost(reason)),
            None => Ok(()),
        }
    }
}

// Boilerplate implementations

impl PartialEq for BoundDevice {
    fn eq(&self, other: &Self) -> bool {
        //clones share backend resources
        self.0.same_device(&other.0)
    }
}

impl Eq for BoundDevice {}
