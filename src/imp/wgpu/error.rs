// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0

/// Backend errors raised while acquiring a device.
///
/// Once a device is bound, failures are reported as [crate::Error] instead.
#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error("No such adapter: {0}")]
    NoSuchAdapter(#[from] wgpu::RequestAdapterError),
    #[error("{0}")]
    RequestDeviceError(#[from] wgpu::RequestDeviceError),
    #[error("Can't start the poll thread: {0}")]
    PollThread(#[from] std::io::Error),
}

/// Sorts a captured device error into the crate taxonomy.
///
/// `validation` chooses the category for validation failures, since the same device error
/// means different things depending on which call raised it.
pub(crate) fn classify(
    error: wgpu::Error,
    validation: fn(String) -> crate::Error,
) -> crate::Error {
    match error {
        wgpu::Error::OutOfMemory { .. } => crate::Error::Allocation(error.to_string()),
        wgpu::Error::Validation { .. } => validation(error.to_string()),
        wgpu::Error::Internal { .. } => crate::Error::DeviceLost(error.to_string()),
    }
}
