// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! wgpu backend.
//!
//! Every raw wgpu call in the crate lives under this module.  The platform-independent
//! types in [crate::bindings] and [crate::compute] validate first and call in here second.

mod bound_device;
mod buffer;
mod encoder;
mod entry_point;
mod error;
mod pipeline;
mod shader;
mod signal;
mod unbound_device;

pub use bound_device::BoundDevice;
pub use buffer::Buffer;
pub use encoder::{Completion, submit};
pub use entry_point::EntryPoint;
pub(crate) use error::Error;
pub use pipeline::Pipeline;
pub use shader::ShaderModule;
pub use unbound_device::UnboundDevice;
