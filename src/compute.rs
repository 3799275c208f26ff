// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! The compute component of kernel_dispatch */

pub mod device;
pub mod dispatch;
pub mod element;
pub mod pipeline;
pub mod shader;

pub use device::{BoundDevice, DeviceOptions};
pub use dispatch::{DispatchExecutor, DispatchRequest, DispatchState, Submission, Workgroups};
pub use element::{Element, ElementLayout};
pub use pipeline::{ComputePipeline, PipelineCache};
pub use shader::ShaderProgram;
