// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! kernel_dispatch is a small orchestration layer for running parallel numeric kernels on a GPU.

It covers one cycle: allocate device memory, bind it to a compiled kernel, dispatch, and read
the results back on the host.

| Step     | Type                                             | Notes                                           |
|----------|--------------------------------------------------|-------------------------------------------------|
| Device   | [compute::device::BoundDevice]                   | Explicitly constructed and passed; no globals   |
| Allocate | [bindings::buffer::BufferResource]               | Capability flags are fixed at creation          |
| Bind     | [bindings::bind_style::BindingDescriptor]        | Slot plus access mode; reduces to a cache key   |
| Compile  | [compute::shader::ShaderProgram], [compute::pipeline::PipelineCache] | One device compilation per layout |
| Dispatch | [compute::dispatch::DispatchExecutor]            | Encode, submit, await, map, decode, release     |

# Failures

Every operation returns [Error].  Invalid configurations are rejected by the call that
received them, before any device work; nothing is retried.  [Error::DeviceLost] is fatal for
the device and everything created from it.

# Backends

Kernels are WGSL, executed through [wgpu](https://wgpu.rs), so we inherit its support for
Vulkan, Metal, DX12 and GL.  Set `WGPU_BACKEND` to choose one.

# Logging

Logging goes through [logwise].  Enable the `logwise_internal` feature to see the crate's
internal diagnostics, such as device polling.
*/

logwise::declare_logging_domain!();

pub mod bindings;
pub mod compute;
pub mod entry_point;
mod error;
mod imp;

pub use error::Error;
