// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Capability flags for device buffers.
//!
//! A buffer declares, once and forever, which operation classes it may take part in.
//! The backend uses these declarations to pick memory placement and to validate usage,
//! so they must be decided up front.
//!
//! # Examples
//!
//! ```
//! use kernel_dispatch::bindings::capabilities::CapabilityFlags;
//!
//! // an input buffer the host uploads into
//! let input = CapabilityFlags::STORAGE | CapabilityFlags::COPY_DESTINATION;
//! assert!(input.contains(CapabilityFlags::STORAGE));
//!
//! // a staging buffer the host reads results from
//! let staging = CapabilityFlags::MAP_READ | CapabilityFlags::COPY_DESTINATION;
//! assert!(staging.validate().is_ok());
//! ```

use crate::error::Error;
use std::fmt::{Debug, Formatter};
use std::ops::{BitOr, BitOrAssign};

/// An immutable, bit-composable set of buffer capabilities.
///
/// The default is [`CapabilityFlags::STORAGE`] alone.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CapabilityFlags(u16);

impl CapabilityFlags {
    /// The buffer may be the source of a copy.
    pub const COPY_SOURCE: CapabilityFlags = CapabilityFlags(1 << 0);
    /// The buffer may be the destination of a copy or a host write.
    pub const COPY_DESTINATION: CapabilityFlags = CapabilityFlags(1 << 1);
    /// The buffer may hold index data.
    pub const INDEX: CapabilityFlags = CapabilityFlags(1 << 2);
    /// The buffer may hold indirect dispatch/draw arguments.
    pub const INDIRECT: CapabilityFlags = CapabilityFlags(1 << 3);
    /// The buffer may be mapped for host reads.
    pub const MAP_READ: CapabilityFlags = CapabilityFlags(1 << 4);
    /// The buffer may be mapped for host writes.
    pub const MAP_WRITE: CapabilityFlags = CapabilityFlags(1 << 5);
    /// The buffer may receive resolved query results.
    pub const QUERY_RESOLVE: CapabilityFlags = CapabilityFlags(1 << 6);
    /// The buffer may be bound as a storage buffer.
    pub const STORAGE: CapabilityFlags = CapabilityFlags(1 << 7);
    /// The buffer may be bound as a uniform buffer.
    pub const UNIFORM: CapabilityFlags = CapabilityFlags(1 << 8);
    /// The buffer may hold vertex data.
    pub const VERTEX: CapabilityFlags = CapabilityFlags(1 << 9);

    const ALL: [(CapabilityFlags, &'static str); 10] = [
        (Self::COPY_SOURCE, "CopySource"),
        (Self::COPY_DESTINATION, "CopyDestination"),
        (Self::INDEX, "IndexUsage"),
        (Self::INDIRECT, "IndirectUsage"),
        (Self::MAP_READ, "MapRead"),
        (Self::MAP_WRITE, "MapWrite"),
        (Self::QUERY_RESOLVE, "QueryResolve"),
        (Self::STORAGE, "Storage"),
        (Self::UNIFORM, "Uniform"),
        (Self::VERTEX, "VertexUsage"),
    ];

    /// The empty set.
    pub const fn empty() -> Self {
        CapabilityFlags(0)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    /// Builds a set from raw bits, discarding unknown ones.
    pub const fn from_bits_truncate(bits: u16) -> Self {
        CapabilityFlags(bits & 0x3ff)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Whether every flag in `other` is also set here.
    pub const fn contains(self, other: CapabilityFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: CapabilityFlags) -> Self {
        CapabilityFlags(self.0 | other.0)
    }

    /// Names of the set flags, in canonical order.
    pub fn names(self) -> Vec<&'static str> {
        Self::ALL
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect()
    }

    /// Checks that the device will accept this combination.
    ///
    /// Mappable buffers are restricted: `MapRead` may only be combined with
    /// `CopyDestination`, and `MapWrite` only with `CopySource`.  The empty set
    /// describes a buffer that can do nothing and is rejected as well.
    pub fn validate(self) -> Result<(), Error> {
        if self.is_empty() {
            return Err(Error::Configuration(
                "a buffer needs at least one capability".to_string(),
            ));
        }
        if self.contains(Self::MAP_READ) && self.contains(Self::MAP_WRITE) {
            return Err(Error::Configuration(
                "MapRead and MapWrite are mutually exclusive".to_string(),
            ));
        }
        if self.contains(Self::MAP_READ) {
            let extra = CapabilityFlags(self.0 & !(Self::MAP_READ.0 | Self::COPY_DESTINATION.0));
            if !extra.is_empty() {
                return Err(Error::Configuration(format!(
                    "MapRead may only be combined with CopyDestination, not {:?}",
                    extra
                )));
            }
        }
        if self.contains(Self::MAP_WRITE) {
            let extra = CapabilityFlags(self.0 & !(Self::MAP_WRITE.0 | Self::COPY_SOURCE.0));
            if !extra.is_empty() {
                return Err(Error::Configuration(format!(
                    "MapWrite may only be combined with CopySource, not {:?}",
                    extra
                )));
            }
        }
        Ok(())
    }

    /// Fails with [`Error::Configuration`] unless every flag in `required` is set.
    pub(crate) fn require(self, required: CapabilityFlags, operation: &str) -> Result<(), Error> {
        if self.contains(required) {
            Ok(())
        } else {
            Err(Error::Configuration(format!(
                "{operation} requires {:?}, buffer has {:?}",
                required, self
            )))
        }
    }
}

impl Default for CapabilityFlags {
    fn default() -> Self {
        Self::STORAGE
    }
}

impl BitOr for CapabilityFlags {
    type Output = CapabilityFlags;
    fn bitor(self, rhs: Self) -> Self::Output {
        self.union(rhs)
    }
}

impl BitOrAssign for CapabilityFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = self.union(rhs);
    }
}

impl Debug for CapabilityFlags {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{{}}}", self.names().join(", "))
    }
}
