// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Host-mapping state tracking for buffers.
//!
//! Every buffer carries one tracker.  The tracker is the only lock in the crate: it
//! guarantees at most one outstanding read-map per buffer and records whether the
//! buffer is currently usable by the device.
//!
//! States:
//! - `UNMAPPED`: the device may use the buffer; a map may begin
//! - `MAPPED_AT_CREATION`: initial contents are being written (never observable by callers)
//! - `MAP_PENDING`: a read-map was requested and the device has not signalled yet
//! - `MAPPED_FOR_READ`: host-visible; must be released before the device can use it again
//!
//! Transitions are atomic compare-exchanges, so a second map request loses the race
//! cleanly instead of queueing.  `MapPending` ends in the device's map callback, not in
//! the future that requested the map, so abandoning that future still leaves the buffer
//! releasable.
//!
//! Separately, a tracker records whether a reader still holds the map (a live map future
//! or view).  Only unclaimed maps may be released from outside.

use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

const UNMAPPED: u8 = 0;
const MAPPED_AT_CREATION: u8 = 1;
const MAP_PENDING: u8 = 2;
const MAPPED_FOR_READ: u8 = 3;

/// Observable mapping state of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapState {
    /// Not mapped.  The buffer may participate in device work.
    Unmapped,
    /// Mapped for writing its initial contents.
    MappedAtCreation,
    /// A read-map has been requested and is waiting on the device.
    MapPending,
    /// Mapped and readable by the host.
    MappedForRead,
}

impl MapState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            UNMAPPED => MapState::Unmapped,
            MAPPED_AT_CREATION => MapState::MappedAtCreation,
            MAP_PENDING => MapState::MapPending,
            MAPPED_FOR_READ => MapState::MappedForRead,
            _ => unreachable!("invalid map state {raw}"),
        }
    }
}

/// Returned when a transition is attempted from the wrong state.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct NotAvailable {
    state: u8,
}

impl NotAvailable {
    pub(crate) fn state(&self) -> MapState {
        MapState::from_raw(self.state)
    }
}

impl Debug for NotAvailable {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "NotAvailable {{ state: {:?} }}", self.state())
    }
}

#[derive(Debug)]
pub(crate) struct MapTracker {
    state: AtomicU8,
    claimed: AtomicBool,
}

impl MapTracker {
    pub(crate) fn new() -> Self {
        MapTracker {
            state: AtomicU8::new(UNMAPPED),
            claimed: AtomicBool::new(false),
        }
    }

    /// Whether a reader holds the current map.
    pub(crate) fn is_claimed(&self) -> bool {
        self.claimed.load(Ordering::Acquire)
    }

    pub(crate) fn state(&self) -> MapState {
        MapState::from_raw(self.state.load(Ordering::Acquire))
    }

    fn transition(&self, from: u8, to: u8) -> Result<(), NotAvailable> {
        self.state
            .compare_exchange(from, to, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|state| NotAvailable { state })
    }

    /// Unmapped → MappedAtCreation
    pub(crate) fn begin_creation_write(&self) -> Result<(), NotAvailable> {
        self.transition(UNMAPPED, MAPPED_AT_CREATION)
    }

    /// MappedAtCreation → Unmapped
    pub(crate) fn end_creation_write(&self) -> Result<(), NotAvailable> {
        self.transition(MAPPED_AT_CREATION, UNMAPPED)
    }

    /// Unmapped → MapPending.  Fails if any map is pending or held.
    ///
    /// The returned claim marks the map as held by its reader until dropped.
    pub(crate) fn begin_read(self: &Arc<Self>) -> Result<ReadClaim, NotAvailable> {
        self.transition(UNMAPPED, MAP_PENDING)?;
        self.claimed.store(true, Ordering::Release);
        Ok(ReadClaim(self.clone()))
    }

    /// MapPending → MappedForRead
    pub(crate) fn finish_read(&self) -> Result<(), NotAvailable> {
        self.transition(MAP_PENDING, MAPPED_FOR_READ)
    }

    /// MapPending → Unmapped, when the device refused the map.
    pub(crate) fn abort_read(&self) -> Result<(), NotAvailable> {
        self.transition(MAP_PENDING, UNMAPPED)
    }

    /// MappedForRead → Unmapped
    pub(crate) fn release(&self) -> Result<(), NotAvailable> {
        self.transition(MAPPED_FOR_READ, UNMAPPED)
    }
}

/// A reader's hold on a read-map.
#[derive(Debug)]
pub(crate) struct ReadClaim(Arc<MapTracker>);

impl Drop for ReadClaim {
    fn drop(&mut self) {
        self.0.claimed.store(false, Ordering::Release);
    }
}
