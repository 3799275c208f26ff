// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
End-to-end kernel dispatch.

A [DispatchExecutor] runs one kernel program.  Each [DispatchRequest] names an entry point,
the buffers to bind, a result buffer the kernel writes, and a staging buffer the host
reads.  A dispatch:

1. validates every binding and buffer, before any device work is issued
2. resolves a pipeline for the bindings' layout, compiling it once per layout
3. encodes a compute pass followed by a copy from the result buffer into the staging buffer
4. submits, without waiting on the device
5. awaits completion, maps the staging buffer, decodes it and releases the map

Steps 1-4 are [DispatchExecutor::submit]; step 5 is [Submission::resolve].  Submitting
several requests before resolving any of them is allowed; they complete in submission
order.

```no_run
# test_executors::sleep_on(async {
use kernel_dispatch::bindings::bind_style::{AccessMode, BindSlot, BindingDescriptor};
use kernel_dispatch::bindings::buffer::BufferResource;
use kernel_dispatch::bindings::capabilities::CapabilityFlags;
use kernel_dispatch::compute::device::{BoundDevice, DeviceOptions};
use kernel_dispatch::compute::dispatch::{DispatchExecutor, DispatchRequest};

const DOUBLE: &str = r#"
@group(0) @binding(0) var<storage, read_write> data: array<f32>;
@compute @workgroup_size(1)
fn main(@builtin(global_invocation_id) id: vec3<u32>) {
    data[id.x] = data[id.x] * 2.0;
}
"#;

let device = BoundDevice::headless(DeviceOptions::default()).await.expect("no device");
let data = BufferResource::with_elements(
    &device,
    "data",
    &[1.0f32, 2.0, 3.0],
    CapabilityFlags::STORAGE | CapabilityFlags::COPY_SOURCE,
).await.expect("can't create buffer");
let staging = BufferResource::new(
    &device,
    "staging",
    Some(&[0u8; 12]),
    CapabilityFlags::MAP_READ | CapabilityFlags::COPY_DESTINATION,
).await.expect("can't create buffer");

let mut executor = DispatchExecutor::new(&device, "double", DOUBLE).await.expect("can't compile");
let request = DispatchRequest::new("main", &data, &staging)
    .bind(BindingDescriptor::derive(&data, BindSlot::new(0), AccessMode::ReadWriteStorage))
    .workgroups(kernel_dispatch::compute::dispatch::Workgroups::Count(3));
let doubled = executor.dispatch_f32(request).await.expect("dispatch failed");
assert_eq!(doubled, vec![2.0, 4.0, 6.0]);
# });
```
*/

use crate::bindings::bind_style::{BindingDescriptor, BindingLayoutSignature};
use crate::bindings::buffer::BufferResource;
use crate::bindings::capabilities::CapabilityFlags;
use crate::bindings::map_state::MapState;
use crate::compute::device::BoundDevice;
use crate::compute::element::{Element, decode};
use crate::compute::pipeline::{ComputePipeline, PipelineCache};
use crate::compute::shader::ShaderProgram;
use crate::error::Error;
use crate::imp;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};

/// How many workgroups to dispatch along x.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Workgroups {
    /// Exactly this many.
    Count(u32),
    /// Enough groups of `width` invocations to cover `count` elements: `ceil(count / width)`.
    ForElements { count: u32, width: u32 },
}

impl Default for Workgroups {
    fn default() -> Self {
        Workgroups::Count(1)
    }
}

impl Workgroups {
    /// The number of groups to dispatch.
    ///
    /// # Errors
    /// [Error::Configuration] if it would be zero, or `width` is zero.
    pub fn resolve(self) -> Result<u32, Error> {
        let groups = match self {
            Workgroups::Count(n) => n,
            Workgroups::ForElements { width: 0, .. } => {
                return Err(Error::Configuration(
                    "workgroup width must be nonzero".to_string(),
                ));
            }
            Workgroups::ForElements { count, width } => count.div_ceil(width),
        };
        if groups == 0 {
            return Err(Error::Configuration(format!(
                "{self:?} dispatches no workgroups"
            )));
        }
        Ok(groups)
    }
}

/// Why a request ended in [DispatchState::Failed].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureReason {
    /// The state the request was in when it failed.
    pub stage: &'static str,
    pub error: Error,
}

/// Progress of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    Encoding,
    Submitted,
    AwaitingCompletion,
    Mapped,
    /// Terminal for the request.
    Failed(FailureReason),
}

const IDLE: u8 = 0;
const ENCODING: u8 = 1;
const SUBMITTED: u8 = 2;
const AWAITING_COMPLETION: u8 = 3;
const MAPPED: u8 = 4;
const FAILED: u8 = 5;

fn stage_name(raw: u8) -> &'static str {
    match raw {
        IDLE => "Idle",
        ENCODING => "Encoding",
        SUBMITTED => "Submitted",
        AWAITING_COMPLETION => "AwaitingCompletion",
        MAPPED => "Mapped",
        _ => "Failed",
    }
}

/// Per-request state, shared between the executor and the request's [Submission].
#[derive(Debug, Default)]
struct StateCell {
    state: AtomicU8,
    failure: OnceLock<FailureReason>,
}

impl StateCell {
    fn advance(&self, to: u8) {
        logwise::trace_sync!("dispatch state {state}", state = stage_name(to));
        self.state.store(to, Ordering::Release);
    }

    /// Records `error` as the request's failure and hands it back.
    fn fail(&self, error: Error) -> Error {
        let stage = stage_name(self.state.load(Ordering::Acquire));
        let _ = self.failure.set(FailureReason {
            stage,
            error: error.clone(),
        });
        self.state.store(FAILED, Ordering::Release);
        error
    }

    fn get(&self) -> DispatchState {
        match self.state.load(Ordering::Acquire) {
            IDLE => DispatchState::Idle,
            ENCODING => DispatchState::Encoding,
            SUBMITTED => DispatchState::Submitted,
            AWAITING_COMPLETION => DispatchState::AwaitingCompletion,
            MAPPED => DispatchState::Mapped,
            _ => match self.failure.get() {
                Some(reason) => DispatchState::Failed(reason.clone()),
                None => unreachable!("failed state without a reason"),
            },
        }
    }

    fn is_device_lost(&self) -> bool {
        self.failure
            .get()
            .is_some_and(|reason| reason.error.is_fatal())
    }
}

/// One dispatch, described before it is submitted.
#[derive(Debug, Clone)]
pub struct DispatchRequest<'a> {
    entry_point: String,
    bindings: Vec<BindingDescriptor<'a>>,
    result: &'a BufferResource,
    staging: &'a BufferResource,
    workgroups: Workgroups,
}

impl<'a> DispatchRequest<'a> {
    /// A request with no bindings and one workgroup.
    pub fn new(
        entry_point: &str,
        result: &'a BufferResource,
        staging: &'a BufferResource,
    ) -> Self {
        DispatchRequest {
            entry_point: entry_point.to_string(),
            bindings: Vec::new(),
            result,
            staging,
            workgroups: Workgroups::default(),
        }
    }

    pub fn bind(mut self, binding: BindingDescriptor<'a>) -> Self {
        self.bindings.push(binding);
        self
    }

    pub fn bind_all(mut self, bindings: impl IntoIterator<Item = BindingDescriptor<'a>>) -> Self {
        self.bindings.extend(bindings);
        self
    }

    pub fn workgroups(mut self, workgroups: Workgroups) -> Self {
        self.workgroups = workgroups;
        self
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }
}

fn require_same_device(device: &BoundDevice, buffer: &BufferResource) -> Result<(), Error> {
    if buffer.device == *device {
        Ok(())
    } else {
        Err(Error::BindingMismatch(format!(
            "{} belongs to a different device",
            buffer.label()
        )))
    }
}

/// Work that has been submitted and not yet read back.
///
/// Dropping a submission abandons the read-back; the device still finishes the work.
#[derive(Debug)]
#[must_use = "the result is only read back by resolve"]
pub struct Submission<'a> {
    device: BoundDevice,
    staging: &'a BufferResource,
    completion: imp::Completion,
    state: Arc<StateCell>,
}

impl Submission<'_> {
    /// Waits for the device, then decodes the staging buffer as `E`.
    ///
    /// The decoded length is `floor(staging.byte_len() / size_of::<E>())`.  The staging
    /// buffer is released before this returns, whether or not decoding succeeded.
    pub async fn resolve<E: Element>(self) -> Result<Vec<E>, Error> {
        let state = self.state.clone();
        self.resolve_inner().await.map_err(|e| state.fail(e))
    }

    async fn resolve_inner<E: Element>(self) -> Result<Vec<E>, Error> {
        self.state.advance(AWAITING_COMPLETION);
        let interval = logwise::perfwarn_begin!("Submission::resolve completion");
        self.completion.wait(self.device.as_ref()).await?;
        drop(interval);
        let view = self.staging.map_read().await?;
        self.state.advance(MAPPED);
        let values = decode::<E>(view.bytes());
        view.release();
        self.state.advance(IDLE);
        Ok(values)
    }

    /// The request's current state.
    pub fn state(&self) -> DispatchState {
        self.state.get()
    }
}

/// Runs the entry points of one kernel program.
#[derive(Debug)]
pub struct DispatchExecutor {
    label: String,
    device: BoundDevice,
    program: ShaderProgram,
    cache: PipelineCache,
    last: Arc<StateCell>,
    lost: bool,
}

impl DispatchExecutor {
    /// Compiles `source` for dispatch on `device`.
    ///
    /// # Errors
    /// [Error::Compile] if the device rejects the source, [Error::DeviceLost] if the device
    /// is gone.
    pub async fn new(device: &BoundDevice, label: &str, source: &str) -> Result<Self, Error> {
        device.check_lost()?;
        let mut cache = PipelineCache::new();
        let program = cache.program(device, label, source).await?;
        Ok(DispatchExecutor {
            label: label.to_string(),
            device: device.clone(),
            program,
            cache,
            last: Arc::new(StateCell::default()),
            lost: false,
        })
    }

    pub fn program(&self) -> &ShaderProgram {
        &self.program
    }

    pub fn cache(&self) -> &PipelineCache {
        &self.cache
    }

    pub fn device(&self) -> &BoundDevice {
        &self.device
    }

    /// State of the most recent request.
    pub fn last_state(&self) -> DispatchState {
        self.last.get()
    }

    fn check_lost(&mut self) -> Result<(), Error> {
        if self.lost {
            return Err(Error::DeviceLost(format!(
                "{} lost its device; rebuild every resource on a new one",
                self.label
            )));
        }
        let lost = match self.device.check_lost() {
            Err(e) => Some(e),
            Ok(()) if self.last.is_device_lost() => Some(Error::DeviceLost(
                "an earlier request lost the device".to_string(),
            )),
            Ok(()) => None,
        };
        match lost {
            Some(e) => {
                self.mark_lost(&e);
                Err(e)
            }
            None => Ok(()),
        }
    }

    /// Cached pipelines die with the device.
    fn mark_lost(&mut self, error: &Error) {
        logwise::error_sync!(
            "{label} is unusable: {err}",
            label = self.label.clone(),
            err = error.to_string()
        );
        self.lost = true;
        self.cache.clear();
    }

    /// Fails unless `request` can be encoded.  Issues no device work.
    fn validate(&self, request: &DispatchRequest<'_>) -> Result<(BindingLayoutSignature, u32), Error> {
        for binding in &request.bindings {
            binding.check_capabilities()?;
            require_same_device(&self.device, binding.buffer)?;
            let state = binding.buffer.map_state();
            if state != MapState::Unmapped {
                return Err(Error::BindingMismatch(format!(
                    "slot {} binds {}, which is {:?}",
                    binding.slot.index(),
                    binding.buffer.label(),
                    state
                )));
            }
        }
        let signature = BindingLayoutSignature::from_descriptors(&request.bindings)?;

        request
            .result
            .capabilities()
            .require(CapabilityFlags::COPY_SOURCE, "result buffer")?;
        request.staging.capabilities().require(
            CapabilityFlags::MAP_READ | CapabilityFlags::COPY_DESTINATION,
            "staging buffer",
        )?;
        for buffer in [request.result, request.staging] {
            require_same_device(&self.device, buffer)?;
            let state = buffer.map_state();
            if state != MapState::Unmapped {
                return Err(Error::Map(format!(
                    "{} is {:?}; release it before dispatching",
                    buffer.label(),
                    state
                )));
            }
        }

        let workgroups = request.workgroups.resolve()?;
        let max = self.device.max_workgroups_per_dimension();
        if workgroups > max {
            return Err(Error::Configuration(format!(
                "{workgroups} workgroups exceeds the device limit of {max}"
            )));
        }
        Ok((signature, workgroups))
    }

    /// Validates, encodes and submits `request` without waiting on the device.
    ///
    /// # Errors
    /// * [Error::BindingMismatch] if a binding's buffer can't be bound the way it asks, is
    ///   mapped, or two bindings share a slot
    /// * [Error::Configuration] if the result buffer lacks `CopySource`, the staging buffer
    ///   lacks `MapRead | CopyDestination`, or the workgroup count is unusable
    /// * [Error::Compile] if the entry point is missing or disagrees with the bindings
    /// * [Error::DeviceLost] once the device is gone
    pub async fn submit<'a>(
        &mut self,
        request: DispatchRequest<'a>,
    ) -> Result<Submission<'a>, Error> {
        self.check_lost()?;
        let state = Arc::new(StateCell::default());
        self.last = state.clone();
        state.advance(ENCODING);
        match self.submit_inner(&request).await {
            Ok(completion) => {
                state.advance(SUBMITTED);
                Ok(Submission {
                    device: self.device.clone(),
                    staging: request.staging,
                    completion,
                    state,
                })
            }
            Err(e) => {
                if e.is_fatal() {
                    self.mark_lost(&e);
                }
                Err(state.fail(e))
            }
        }
    }

    async fn submit_inner(
        &mut self,
        request: &DispatchRequest<'_>,
    ) -> Result<imp::Completion, Error> {
        let (signature, workgroups) = self.validate(request)?;
        let pipeline: ComputePipeline = self
            .cache
            .get_or_create(&self.device, &self.program, &request.entry_point, &signature)
            .await?;
        let bindings = request
            .bindings
            .iter()
            .map(|b| (b.slot.index(), &b.buffer.imp))
            .collect::<Vec<_>>();
        let copy_len = request
            .result
            .allocated_len()
            .min(request.staging.allocated_len());
        logwise::trace_sync!(
            "encoding {entry_point} with {workgroups} workgroups",
            entry_point = request.entry_point.clone(),
            workgroups = workgroups
        );
        imp::submit(
            self.device.as_ref(),
            &self.label,
            &pipeline.imp,
            &bindings,
            workgroups,
            &request.result.imp,
            &request.staging.imp,
            copy_len as u64,
        )
        .await
    }

    /// Submits `request` and reads back the staging buffer as `E`.
    pub async fn dispatch<E: Element>(
        &mut self,
        request: DispatchRequest<'_>,
    ) -> Result<Vec<E>, Error> {
        let submission = self.submit(request).await?;
        let result = submission.resolve::<E>().await;
        match &result {
            Err(e) if e.is_fatal() => self.mark_lost(e),
            _ => {}
        }
        result
    }

    /// [Self::dispatch] with the default `f32` element layout.
    pub async fn dispatch_f32(&mut self, request: DispatchRequest<'_>) -> Result<Vec<f32>, Error> {
        self.dispatch::<f32>(request).await
    }
}
