// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Typed failures for every operation in the crate.
//!
//! Each variant corresponds to one failure category.  Nothing in the crate logs an
//! invalid configuration and carries on; the call that received the bad input
//! returns one of these instead.  Nothing is retried internally either.

/// The error type returned by buffer, binding, pipeline and dispatch operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The device could not satisfy a creation request.
    #[error("Allocation failed: {0}")]
    Allocation(String),
    /// An invalid capability or access-mode combination was requested.
    #[error("Invalid configuration: {0}")]
    Configuration(String),
    /// The kernel source was rejected by the device, or does not expose what was asked of it.
    #[error("Kernel compilation failed: {0}")]
    Compile(String),
    /// A binding's access mode is not supported by its buffer.
    #[error("Binding mismatch: {0}")]
    BindingMismatch(String),
    /// A buffer was mapped twice, or mapping was attempted on a buffer that can't be mapped.
    #[error("Map failed: {0}")]
    Map(String),
    /// The device context was lost.  Every resource created from it is invalid.
    #[error("Device lost: {0}")]
    DeviceLost(String),
}

impl Error {
    /// Whether this failure invalidates the device and everything created from it.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::DeviceLost(_))
    }
}
