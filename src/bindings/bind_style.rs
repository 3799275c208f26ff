// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Defines the way buffers are bound for a dispatch.
//!
//! A [BindingDescriptor] pairs one [BufferResource] with a numbered slot in the kernel's
//! interface and the way the kernel accesses it.  The descriptors for one dispatch reduce to
//! a [BindingLayoutSignature], which is all a compiled pipeline depends on; two dispatches
//! with the same signature can share a pipeline even when their buffers differ.
//!
//! # Key Concepts
//!
//! - **Bind Slots**: correspond to `@binding(n)` locations in bind group 0
//! - **Access Modes**: read-only storage, read-write storage, or uniform
//!
//! # Example
//!
//! ```no_run
//! # test_executors::sleep_on(async {
//! use kernel_dispatch::bindings::bind_style::{AccessMode, BindSlot, BindingDescriptor};
//! use kernel_dispatch::bindings::buffer::BufferResource;
//! use kernel_dispatch::bindings::capabilities::CapabilityFlags;
//! # use kernel_dispatch::compute::device::{BoundDevice, DeviceOptions};
//! # let device = BoundDevice::headless(DeviceOptions::default()).await.expect("no device");
//! let input = BufferResource::with_elements(&device, "input", &[1.0f32, 2.0], CapabilityFlags::STORAGE)
//!     .await
//!     .expect("can't create buffer");
//! let binding = BindingDescriptor::derive(&input, BindSlot::new(0), AccessMode::ReadOnlyStorage);
//! // string spellings are accepted too, and rejected when unknown
//! assert!(BindingDescriptor::derive_named(&input, BindSlot::new(0), "read-only-storage").is_ok());
//! assert!(BindingDescriptor::derive_named(&input, BindSlot::new(0), "texture").is_err());
//! # });
//! ```

use crate::bindings::buffer::BufferResource;
use crate::bindings::capabilities::CapabilityFlags;
use crate::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// A binding slot within bind group 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindSlot {
    pub(crate) pass_index: u32,
}

impl BindSlot {
    /// Creates a new binding slot with the specified index.
    pub const fn new(pass_index: u32) -> Self {
        Self { pass_index }
    }

    pub const fn index(self) -> u32 {
        self.pass_index
    }
}

/// How a kernel accesses a bound buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessMode {
    ReadOnlyStorage,
    ReadWriteStorage,
    Uniform,
}

impl AccessMode {
    /// The capability a buffer needs to be bound this way.
    pub const fn required_capability(self) -> CapabilityFlags {
        match self {
            AccessMode::ReadOnlyStorage | AccessMode::ReadWriteStorage => CapabilityFlags::STORAGE,
            AccessMode::Uniform => CapabilityFlags::UNIFORM,
        }
    }

    const fn as_str(self) -> &'static str {
        match self {
            AccessMode::ReadOnlyStorage => "read-only-storage",
            AccessMode::ReadWriteStorage => "storage",
            AccessMode::Uniform => "uniform",
        }
    }
}

impl Display for AccessMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read-only-storage" => Ok(AccessMode::ReadOnlyStorage),
            "storage" | "read-write-storage" => Ok(AccessMode::ReadWriteStorage),
            "uniform" => Ok(AccessMode::Uniform),
            other => Err(Error::Configuration(format!(
                "unknown access mode {other:?}; expected read-only-storage, storage or uniform"
            ))),
        }
    }
}

/// One buffer bound at one slot with one access mode.
///
/// Descriptors borrow their buffer; the buffer must outlive every dispatch using it.
#[derive(Debug, Clone, Copy)]
pub struct BindingDescriptor<'a> {
    pub(crate) buffer: &'a BufferResource,
    pub(crate) slot: BindSlot,
    pub(crate) access: AccessMode,
}

impl<'a> BindingDescriptor<'a> {
    /// Associates `buffer` with `slot`.
    ///
    /// Whether the buffer's capabilities satisfy `access` is checked when the descriptor
    /// is dispatched, before any device work is issued.
    pub fn derive(buffer: &'a BufferResource, slot: BindSlot, access: AccessMode) -> Self {
        BindingDescriptor {
            buffer,
            slot,
            access,
        }
    }

    /// Like [Self::derive], with the access mode spelled as a string.
    ///
    /// # Errors
    /// [Error::Configuration] if `access` is not a recognized access mode.
    pub fn derive_named(
        buffer: &'a BufferResource,
        slot: BindSlot,
        access: &str,
    ) -> Result<Self, Error> {
        Ok(Self::derive(buffer, slot, access.parse()?))
    }

    pub fn buffer(&self) -> &'a BufferResource {
        self.buffer
    }

    pub fn slot(&self) -> BindSlot {
        self.slot
    }

    pub fn access(&self) -> AccessMode {
        self.access
    }

    /// Fails with [Error::BindingMismatch] unless the buffer supports the access mode.
    pub(crate) fn check_capabilities(&self) -> Result<(), Error> {
        let required = self.access.required_capability();
        if self.buffer.capabilities().contains(required) {
            Ok(())
        } else {
            Err(Error::BindingMismatch(format!(
                "slot {} binds {} as {}, which requires {:?}; buffer has {:?}",
                self.slot.pass_index,
                self.buffer.label(),
                self.access,
                required,
                self.buffer.capabilities()
            )))
        }
    }
}

/// The ordered `(slot, access)` pairs of a set of bindings.
///
/// Used as a pipeline cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct BindingLayoutSignature {
    entries: Vec<(BindSlot, AccessMode)>,
}

impl BindingLayoutSignature {
    /// Builds a signature from `(slot, access)` pairs in any order.
    ///
    /// # Errors
    /// [Error::BindingMismatch] if a slot appears twice.
    pub fn new(mut entries: Vec<(BindSlot, AccessMode)>) -> Result<Self, Error> {
        entries.sort_by_key(|(slot, _)| *slot);
        if let Some(pair) = entries.windows(2).find(|pair| pair[0].0 == pair[1].0) {
            return Err(Error::BindingMismatch(format!(
                "slot {} is bound more than once",
                pair[0].0.pass_index
            )));
        }
        Ok(BindingLayoutSignature { entries })
    }

    pub fn from_descriptors(bindings: &[BindingDescriptor<'_>]) -> Result<Self, Error> {
        Self::new(bindings.iter().map(|b| (b.slot, b.access)).collect())
    }

    /// Entries sorted by slot.
    pub fn entries(&self) -> &[(BindSlot, AccessMode)] {
        &self.entries
    }
}
