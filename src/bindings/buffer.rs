// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Device buffers tagged with capability flags.

A [BufferResource] owns one region of device memory.  Its [CapabilityFlags] are fixed when
it is created and decide which operations it will accept afterwards; its [MapState] changes
as the host maps and releases it.

```no_run
# test_executors::sleep_on(async {
use kernel_dispatch::bindings::buffer::BufferResource;
use kernel_dispatch::bindings::capabilities::CapabilityFlags;
use kernel_dispatch::compute::device::{BoundDevice, DeviceOptions};
let device = BoundDevice::headless(DeviceOptions::default()).await.expect("no device");
let staging = BufferResource::new(
    &device,
    "staging",
    Some(&[0u8; 16]),
    CapabilityFlags::MAP_READ | CapabilityFlags::COPY_DESTINATION,
).await.expect("can't create buffer");
let view = staging.map_read().await.expect("can't map");
assert_eq!(view.len(), 16);
view.release();
# });
```
*/

use crate::bindings::capabilities::CapabilityFlags;
use crate::bindings::map_state::{MapState, MapTracker, ReadClaim};
use crate::compute::device::BoundDevice;
use crate::compute::element::{Element, elements_as_bytes};
use crate::error::Error;
use crate::imp;
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Size of a buffer created without initial contents.
pub const DEFAULT_BYTE_LEN: usize = 4;

/// Offsets and lengths of device copies must be multiples of this.
///
/// Allocations are rounded up to it as well, and kernels see the whole allocation: for a
/// buffer whose [BufferResource::byte_len] is not a multiple, `arrayLength` counts the
/// zeroed padding word.
pub const COPY_ALIGNMENT: usize = wgpu::COPY_BUFFER_ALIGNMENT as usize;

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

const fn align_up(len: usize) -> usize {
    len.div_ceil(COPY_ALIGNMENT) * COPY_ALIGNMENT
}

/// A region of device memory with an immutable capability set.
#[derive(Debug)]
pub struct BufferResource {
    id: u64,
    label: String,
    byte_len: usize,
    capabilities: CapabilityFlags,
    map_state: Arc<MapTracker>,
    pub(crate) imp: imp::Buffer,
    pub(crate) device: BoundDevice,
}

impl BufferResource {
    /// Creates a buffer.
    ///
    /// The size is `initial.len()` when initial contents are given, otherwise
    /// [DEFAULT_BYTE_LEN].  Initial contents are written while the buffer is mapped at
    /// creation; the buffer is `Unmapped` by the time this returns.
    ///
    /// # Errors
    /// * [Error::Configuration] for an unsupported flag combination or empty contents
    /// * [Error::Allocation] if the device declines the request, including any size over
    ///   [BoundDevice::max_buffer_size]
    pub async fn new(
        device: &BoundDevice,
        label: &str,
        initial: Option<&[u8]>,
        capabilities: CapabilityFlags,
    ) -> Result<Self, Error> {
        let byte_len = initial.map_or(DEFAULT_BYTE_LEN, <[u8]>::len);
        Self::create(device, label, byte_len, initial, capabilities).await
    }

    /// Creates a zero-filled buffer of `byte_len` bytes.
    ///
    /// # Errors
    /// As [Self::new]; a zero `byte_len` is [Error::Configuration].
    pub async fn zeroed(
        device: &BoundDevice,
        label: &str,
        byte_len: usize,
        capabilities: CapabilityFlags,
    ) -> Result<Self, Error> {
        Self::create(device, label, byte_len, None, capabilities).await
    }

    /// Creates a buffer whose initial contents are `elements`.
    pub async fn with_elements<E: Element>(
        device: &BoundDevice,
        label: &str,
        elements: &[E],
        capabilities: CapabilityFlags,
    ) -> Result<Self, Error> {
        Self::new(device, label, Some(elements_as_bytes(elements)), capabilities).await
    }

    async fn create(
        device: &BoundDevice,
        label: &str,
        byte_len: usize,
        initial: Option<&[u8]>,
        capabilities: CapabilityFlags,
    ) -> Result<Self, Error> {
        capabilities.validate()?;
        device.check_lost()?;
        if byte_len == 0 {
            return Err(Error::Configuration(format!("{label}: buffer is empty")));
        }
        let allocated_len = align_up(byte_len) as u64;
        let max = device.max_buffer_size();
        //the device can't report an oversized mapped-at-creation buffer as an error
        if allocated_len > max {
            return Err(Error::Allocation(format!(
                "{label}: {allocated_len} bytes exceeds the device limit of {max}"
            )));
        }
        let map_state = Arc::new(MapTracker::new());
        if initial.is_some() {
            map_state
                .begin_creation_write()
                .map_err(|e| Error::Map(format!("{label}: {e:?}")))?;
        }
        let imp = imp::Buffer::new(
            device.as_ref(),
            label,
            allocated_len,
            capabilities,
            initial,
        )
        .await?;
        if initial.is_some() {
            map_state
                .end_creation_write()
                .map_err(|e| Error::Map(format!("{label}: {e:?}")))?;
        }
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        logwise::trace_sync!(
            "Created buffer {id} {label} of {byte_len} bytes",
            id = id,
            label = label,
            byte_len = byte_len
        );
        Ok(BufferResource {
            id,
            label: label.to_string(),
            byte_len,
            capabilities,
            map_state,
            imp,
            device: device.clone(),
        })
    }

    /// Writes `data` at `offset` through the device queue.
    ///
    /// The write is ordered before any later submission.  `offset` must be a multiple of
    /// [COPY_ALIGNMENT]; a trailing partial word is zero-padded.
    ///
    /// # Errors
    /// * [Error::Configuration] without [CapabilityFlags::COPY_DESTINATION], or for a
    ///   misaligned or out-of-bounds range
    /// * [Error::Map] while the buffer is mapped
    pub async fn write(&self, data: &[u8], offset: usize) -> Result<(), Error> {
        self.capabilities
            .require(CapabilityFlags::COPY_DESTINATION, "write")?;
        if offset % COPY_ALIGNMENT != 0 {
            return Err(Error::Configuration(format!(
                "{}: write offset {offset} is not a multiple of {COPY_ALIGNMENT}",
                self.label
            )));
        }
        let end = offset.checked_add(data.len());
        if end.is_none_or(|end| end > self.byte_len) {
            return Err(Error::Configuration(format!(
                "{}: write of {} bytes at {offset} exceeds length {}",
                self.label,
                data.len(),
                self.byte_len
            )));
        }
        if data.is_empty() {
            return Ok(());
        }
        let state = self.map_state.state();
        if state != MapState::Unmapped {
            return Err(Error::Map(format!(
                "{}: can't write while {:?}",
                self.label, state
            )));
        }
        let aligned = align_up(data.len());
        if aligned == data.len() {
            self.imp
                .write(self.device.as_ref(), offset as u64, data)
                .await
        } else {
            //padding stays inside the allocation, which was rounded up the same way
            let mut padded = data.to_vec();
            padded.resize(aligned, 0);
            self.imp
                .write(self.device.as_ref(), offset as u64, &padded)
                .await
        }
    }

    /// Maps the buffer for reading.
    ///
    /// Suspends until the device reports the contents are host-visible.  The buffer stays
    /// mapped, and unusable by the device, until the returned view is released or dropped.
    ///
    /// Dropping this future early does not cancel the map: the buffer still becomes
    /// `MappedForRead` once the device gets there, and [Self::release] returns it to
    /// `Unmapped`.
    ///
    /// # Errors
    /// [Error::Map] without [CapabilityFlags::MAP_READ], or when a map is already pending
    /// or held.
    pub async fn map_read(&self) -> Result<MappedView<'_>, Error> {
        if !self.capabilities.contains(CapabilityFlags::MAP_READ) {
            return Err(Error::Map(format!(
                "{}: buffer lacks MapRead, has {:?}",
                self.label, self.capabilities
            )));
        }
        let claim = self.map_state.begin_read().map_err(|e| {
            Error::Map(format!("{}: already mapped ({:?})", self.label, e.state()))
        })?;
        let interval = logwise::perfwarn_begin!("BufferResource::map_read");
        let mapped = self
            .imp
            .map_read(self.device.as_ref(), self.map_state.clone())
            .await;
        drop(interval);
        let mut bytes = mapped?;
        bytes.truncate(self.byte_len);
        Ok(MappedView {
            buffer: self,
            bytes,
            released: false,
            _claim: claim,
        })
    }

    /// Unmaps a buffer left `MappedForRead` by an abandoned [Self::map_read].
    ///
    /// Buffers mapped through a live [MappedView] are released by the view instead.
    ///
    /// # Errors
    /// [Error::Map] unless the buffer is `MappedForRead` with no live view or map future.
    pub fn release(&self) -> Result<(), Error> {
        if self.map_state.is_claimed() {
            return Err(Error::Map(format!(
                "{}: still held by a reader; release the view instead",
                self.label
            )));
        }
        self.release_map().map_err(|state| {
            Error::Map(format!("{}: can't release while {:?}", self.label, state))
        })
    }

    /// Ends the buffer's lifetime, freeing device memory now rather than when the last
    /// in-flight use finishes.
    pub fn destroy(self) {
        logwise::trace_sync!("Destroying buffer {id}", id = self.id);
        self.imp.destroy();
    }

    /// Process-unique identifier.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// The requested length.  The allocation may be rounded up to [COPY_ALIGNMENT].
    pub fn byte_len(&self) -> usize {
        self.byte_len
    }

    pub fn capabilities(&self) -> CapabilityFlags {
        self.capabilities
    }

    pub fn map_state(&self) -> MapState {
        self.map_state.state()
    }

    pub(crate) fn allocated_len(&self) -> usize {
        align_up(self.byte_len)
    }

    fn release_map(&self) -> Result<(), MapState> {
        let state = self.map_state.state();
        if state != MapState::MappedForRead {
            return Err(state);
        }
        self.imp.unmap();
        self.map_state.release().map_err(|e| e.state())
    }
}

/// Read-only contents of a buffer mapped by [BufferResource::map_read].
///
/// Releasing (or dropping) the view unmaps the buffer, so it returns to `Unmapped` on
/// every exit path.
#[derive(Debug)]
#[must_use = "dropping the view releases the map immediately"]
pub struct MappedView<'a> {
    buffer: &'a BufferResource,
    bytes: Vec<u8>,
    released: bool,
    //dropped after the map is released
    _claim: ReadClaim,
}

impl MappedView<'_> {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Decodes the mapped bytes as elements.  A trailing partial element is ignored.
    pub fn decode<E: Element>(&self) -> Vec<E> {
        crate::compute::element::decode(&self.bytes)
    }

    /// Unmaps the buffer.
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if !self.released {
            self.released = true;
            if let Err(state) = self.buffer.release_map() {
                logwise::warn_sync!(
                    "release found buffer in {state}",
                    state = logwise::privacy::LogIt(&state)
                );
            }
        }
    }
}

impl Deref for MappedView<'_> {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.bytes
    }
}

impl Drop for MappedView<'_> {
    fn drop(&mut self) {
        self.release_inner();
    }
}
