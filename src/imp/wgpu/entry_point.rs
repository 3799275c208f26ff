// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use wgpu::{Backends, InstanceDescriptor};

#[derive(Debug)]
pub struct EntryPoint {
    pub(super) instance: wgpu::Instance,
    backends: Backends,
}

impl EntryPoint {
    /// An instance with no display attached.
    pub fn headless() -> Result<Self, crate::imp::wgpu::Error> {
        //honours WGPU_BACKEND, WGPU_DX12_COMPILER and friends
        let descriptor = InstanceDescriptor::from_env_or_default();
        let backends = descriptor.backends;
        let instance = wgpu::Instance::new(&descriptor);
        Ok(EntryPoint { instance, backends })
    }

    /// Backends this instance may pick adapters from.
    pub fn backends(&self) -> Backends {
        self.backends
    }
}
