// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! The backend instance every device is picked from.
//!
//! Compute needs no window or surface, so an [EntryPoint] is created headlessly and can live
//! on any thread.  Most callers never touch it directly:
//! [BoundDevice::headless](crate::compute::device::BoundDevice::headless) creates one,
//! picks an adapter from it and binds a device in one step.
use crate::imp;
use std::fmt::{Debug, Formatter};

/// The backend instance.  One per process is enough; share it behind an `Arc`.
#[derive(Debug)]
pub struct EntryPoint(pub(crate) imp::EntryPoint);

/// The backend instance could not be created.
#[derive(Debug)]
pub struct EntryPointError(imp::Error);
impl std::fmt::Display for EntryPointError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}
impl std::error::Error for EntryPointError {}

impl EntryPoint {
    /// Creates a headless backend instance for compute.
    ///
    /// Backends come from `WGPU_BACKEND` (for example `vulkan` or `metal`) when it is set,
    /// otherwise every backend the platform supports is enabled.  No surface is created,
    /// and adapters picked from this instance are never asked to present.
    pub async fn new() -> Result<Self, EntryPointError> {
        let instance = imp::EntryPoint::headless().map_err(EntryPointError)?;
        logwise::info_sync!(
            "Created compute entry point {backends}",
            backends = logwise::privacy::LogIt(&instance.backends())
        );
        Ok(EntryPoint(instance))
    }
}
