// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use crate::imp::Error;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle};
use wgpu::{ErrorFilter, Limits, PollType, Trace};

/// Owns the device and its poll thread.
#[derive(Debug)]
struct BoundDeviceResources {
    device: wgpu::Device,
    queue: wgpu::Queue,
    //kept alive for the device's sake
    _adapter: wgpu::Adapter,
    lost: Arc<OnceLock<String>>,
    poll_thread: Option<JoinHandle<()>>,
    poll_shutdown: Arc<AtomicBool>,
    poll_trigger: Sender<()>,
}

/// Shared handle to a bound device.  Clones refer to the same device.
#[derive(Debug, Clone)]
pub struct BoundDevice {
    resources: Arc<BoundDeviceResources>,
}

impl BoundDevice {
    pub(crate) async fn bind(
        unbound_device: crate::compute::device::UnboundDevice,
    ) -> Result<Self, Error> {
        let label = unbound_device.1;
        let adapter = unbound_device.0.adapter;
        //everything the adapter offers; kernels with many storage bindings need it
        let limits = adapter.limits();
        let descriptor = wgpu::DeviceDescriptor {
            label: Some(&label),
            required_features: Default::default(),
            required_limits: limits,
            memory_hints: wgpu::MemoryHints::MemoryUsage,
            trace: Trace::Off,
        };
        let (device, queue) = adapter.request_device(&descriptor).await?;
        logwise::info_sync!("Bound device {label}", label = label.clone());

        let lost = Arc::new(OnceLock::new());
        let lost_clone = lost.clone();
        device.set_device_lost_callback(move |reason, message| {
            let description = format!("{reason:?}: {message}");
            match reason {
                //dropping the last handle destroys the device
                wgpu::DeviceLostReason::Destroyed => {
                    logwise::info_sync!("Device destroyed {message}", message = message);
                }
                _ => {
                    logwise::error_sync!(
                        "Device lost {description}",
                        description = description.clone()
                    );
                }
            }
            let _ = lost_clone.set(description);
        });

        let poll_device = device.clone();
        let poll_shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = poll_shutdown.clone();
        let (poll_sender, poll_receiver): (Sender<()>, Receiver<()>) = mpsc::channel();
        let poll_thread = thread::Builder::new()
            .name("kernel_dispatch_poll".to_string())
            .spawn(move || {
                //each message means work may be ready; the final one is the shutdown wake
                while poll_receiver.recv().is_ok() {
                    if shutdown_clone.load(Ordering::Relaxed) {
                        break;
                    }
                    logwise::debuginternal_sync!("polling device");
                    if let Err(e) = poll_device.poll(PollType::Wait) {
                        logwise::warn_sync!("poll failed: {err}", err = logwise::privacy::LogIt(&e));
                    }
                }
            })?;

        let resources = BoundDeviceResources {
            device,
            queue,
            _adapter: adapter,
            lost,
            poll_thread: Some(poll_thread),
            poll_shutdown,
            poll_trigger: poll_sender,
        };
        Ok(BoundDevice {
            resources: Arc::new(resources),
        })
    }

    /// Signal the polling thread that device work may be ready
    pub fn set_needs_poll(&self) {
        //channel only closes once we're dropping
        let _ = self.resources.poll_trigger.send(());
    }

    /// Whether both handles refer to the same device.
    pub fn same_device(&self, other: &BoundDevice) -> bool {
        Arc::ptr_eq(&self.resources, &other.resources)
    }

    pub(super) fn queue(&self) -> &wgpu::Queue {
        &self.resources.queue
    }

    pub fn limits(&self) -> Limits {
        self.resources.device.limits()
    }

    /// Destroys the device.  Work in flight is abandoned and the device counts as lost.
    pub fn destroy(&self) {
        let _ = self
            .resources
            .lost
            .set("Destroyed: destroyed by the application".to_string());
        self.resources.device.destroy();
        //outstanding callbacks are flushed by the next poll
        self.set_needs_poll();
    }

    /// The loss description, once the device has been lost.
    pub fn lost_reason(&self) -> Option<String> {
        self.resources.lost.get().cloned()
    }

    pub(super) fn check_lost(&self) -> Result<(), crate::Error> {
        match self.resources.lost.get() {
            Some(reason) => Err(crate::Error::DeviceLost(reason.clone())),
            None => Ok(()),
        }
    }

    /// Runs `f` inside error scopes and reports the first device error it raised.
    ///
    /// Scopes are thread-local, so all of them are popped before anything is awaited.
    pub(super) async fn scoped<R>(
        &self,
        f: impl FnOnce(&wgpu::Device) -> R,
    ) -> (R, Option<wgpu::Error>) {
        let device = &self.resources.device;
        device.push_error_scope(ErrorFilter::Internal);
        device.push_error_scope(ErrorFilter::OutOfMemory);
        device.push_error_scope(ErrorFilter::Validation);
        let r = f(device);
        let validation = device.pop_error_scope();
        let out_of_memory = device.pop_error_scope();
        let internal = device.pop_error_scope();
        if let Some(e) = validation.await {
            return (r, Some(e));
        }
        if let Some(e) = out_of_memory.await {
            return (r, Some(e));
        }
        (r, internal.await)
    }
}

impl Drop for BoundDeviceResources {
    fn drop(&mut self) {
        self.poll_shutdown.store(true, Ordering::Relaxed);
        //wake the thread so it observes the flag
        let _ = self.poll_trigger.send(());
        if let Some(handle) = self.poll_thread.take() {
            let _ = handle.join();
        }
    }
}
