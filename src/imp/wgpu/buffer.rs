// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use super::BoundDevice;
use super::error::classify;
use super::signal::signal;
use crate::bindings::capabilities::CapabilityFlags;
use crate::bindings::map_state::MapTracker;
use std::sync::Arc;
use wgpu::BufferUsages;

fn usages(capabilities: CapabilityFlags) -> BufferUsages {
    const TABLE: [(CapabilityFlags, BufferUsages); 10] = [
        (CapabilityFlags::COPY_SOURCE, BufferUsages::COPY_SRC),
        (CapabilityFlags::COPY_DESTINATION, BufferUsages::COPY_DST),
        (CapabilityFlags::INDEX, BufferUsages::INDEX),
        (CapabilityFlags::INDIRECT, BufferUsages::INDIRECT),
        (CapabilityFlags::MAP_READ, BufferUsages::MAP_READ),
        (CapabilityFlags::MAP_WRITE, BufferUsages::MAP_WRITE),
        (CapabilityFlags::QUERY_RESOLVE, BufferUsages::QUERY_RESOLVE),
        (CapabilityFlags::STORAGE, BufferUsages::STORAGE),
        (CapabilityFlags::UNIFORM, BufferUsages::UNIFORM),
        (CapabilityFlags::VERTEX, BufferUsages::VERTEX),
    ];
    TABLE
        .iter()
        .filter(|(flag, _)| capabilities.contains(*flag))
        .fold(BufferUsages::empty(), |acc, (_, usage)| acc | *usage)
}

#[derive(Debug, Clone)]
pub struct Buffer {
    pub(super) buffer: wgpu::Buffer,
}

impl Buffer {
    /// Creates a device buffer of `allocated_len` bytes, a multiple of 4.
    ///
    /// When `initial` is provided the buffer is mapped at creation, filled, and unmapped
    /// before this returns.
    pub async fn new(
        device: &BoundDevice,
        label: &str,
        allocated_len: u64,
        capabilities: CapabilityFlags,
        initial: Option<&[u8]>,
    ) -> Result<Self, crate::Error> {
        device.check_lost()?;
        let (buffer, error) = device
            .scoped(|d| {
                let buffer = d.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(label),
                    size: allocated_len,
                    usage: usages(capabilities),
                    mapped_at_creation: initial.is_some(),
                });
                if let Some(initial) = initial {
                    let mut view = buffer.get_mapped_range_mut(..);
                    view[..initial.len()].copy_from_slice(initial);
                    drop(view);
                    buffer.unmap();
                }
                buffer
            })
            .await;
        match error {
            //any validation failure here is the device declining the request
            Some(e) => Err(classify(e, crate::Error::Allocation)),
            None => Ok(Buffer { buffer }),
        }
    }

    pub async fn write(
        &self,
        device: &BoundDevice,
        offset: u64,
        data: &[u8],
    ) -> Result<(), crate::Error> {
        device.check_lost()?;
        let ((), error) = device
            .scoped(|_| device.queue().write_buffer(&self.buffer, offset, data))
            .await;
        match error {
            Some(e) => Err(classify(e, crate::Error::Configuration)),
            None => Ok(()),
        }
    }

    /// Maps the whole allocation for reading and copies it out.
    ///
    /// `tracker` must be `MapPending`.  The device's callback moves it on, to
    /// `MappedForRead` or back to `Unmapped`, whether or not this future is still around to
    /// see it.  The buffer stays mapped until [Self::unmap].
    pub async fn map_read(
        &self,
        device: &BoundDevice,
        tracker: Arc<MapTracker>,
    ) -> Result<Vec<u8>, crate::Error> {
        if let Err(e) = device.check_lost() {
            let _ = tracker.abort_read();
            return Err(e);
        }
        let (sender, future) = signal();
        let callback_tracker = tracker.clone();
        self.buffer
            .map_async(wgpu::MapMode::Read, .., move |result| {
                let moved = match &result {
                    Ok(()) => callback_tracker.finish_read(),
                    Err(_) => callback_tracker.abort_read(),
                };
                if let Err(e) = moved {
                    logwise::warn_sync!(
                        "map callback found buffer in {state}",
                        state = logwise::privacy::LogIt(&e.state())
                    );
                }
                sender.send(result);
            });
        device.set_needs_poll();
        match future.await {
            Some(Ok(())) => {
                let view = self.buffer.get_mapped_range(..);
                Ok(view.to_vec())
            }
            Some(Err(e)) => {
                device.check_lost()?;
                Err(crate::Error::Map(e.to_string()))
            }
            None => {
                //the callback was discarded, so nothing else will end the pending map
                let _ = tracker.abort_read();
                device.check_lost()?;
                Err(crate::Error::Map(
                    "map callback was discarded by the device".to_string(),
                ))
            }
        }
    }

    pub fn unmap(&self) {
        self.buffer.unmap();
    }

    pub fn destroy(&self) {
        self.buffer.destroy();
    }
}
