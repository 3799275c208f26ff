// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! Defines buffers and the ways they are bound to kernels */

pub mod bind_style;
pub mod buffer;
pub mod capabilities;
pub mod map_state;

pub use bind_style::{AccessMode, BindSlot, BindingDescriptor, BindingLayoutSignature};
pub use buffer::{BufferResource, MappedView};
pub use capabilities::CapabilityFlags;
pub use map_state::MapState;
