// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//at the moment we only support wgpu

mod wgpu;

pub(crate) use self::wgpu::*;
