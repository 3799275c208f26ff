// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Shared fixtures for integration tests.
#![allow(dead_code)]

use kernel_dispatch::bindings::buffer::BufferResource;
use kernel_dispatch::bindings::capabilities::CapabilityFlags;
use kernel_dispatch::compute::device::{BoundDevice, DeviceOptions};

/// Copies `input` into `output`, one invocation per element.
pub const IDENTITY: &str = r#"
@group(0) @binding(0) var<storage, read> input: array<f32>;
@group(0) @binding(1) var<storage, read_write> output: array<f32>;

@compute @workgroup_size(64)
fn main(@builtin(global_invocation_id) id: vec3<u32>) {
    if (id.x < arrayLength(&input)) {
        output[id.x] = input[id.x];
    }
}

// doubles while copying
@compute @workgroup_size(64)
fn double(@builtin(global_invocation_id) id: vec3<u32>) {
    if (id.x < arrayLength(&input)) {
        output[id.x] = input[id.x] * 2.0;
    }
}
"#;

/// Sums `input` sequentially into `output[0]`.
pub const SUM: &str = r#"
@group(0) @binding(0) var<storage, read> input: array<f32>;
@group(0) @binding(1) var<storage, read_write> output: array<f32>;

@compute @workgroup_size(1)
fn sum() {
    var total = 0.0;
    for (var i = 0u; i < arrayLength(&input); i++) {
        total += input[i];
    }
    output[0] = total;
}
"#;

/// `out = a + b`, elementwise.
pub const ADD: &str = r#"
@group(0) @binding(0) var<storage, read> a: array<f32>;
@group(0) @binding(1) var<storage, read> b: array<f32>;
@group(0) @binding(2) var<storage, read_write> out: array<f32>;

@compute @workgroup_size(64)
fn add(@builtin(global_invocation_id) id: vec3<u32>) {
    if (id.x < arrayLength(&out)) {
        out[id.x] = a[id.x] + b[id.x];
    }
}
"#;

pub const INPUT: CapabilityFlags = CapabilityFlags::STORAGE.union(CapabilityFlags::COPY_DESTINATION);
pub const OUTPUT: CapabilityFlags = CapabilityFlags::STORAGE.union(CapabilityFlags::COPY_SOURCE);
pub const STAGING: CapabilityFlags =
    CapabilityFlags::MAP_READ.union(CapabilityFlags::COPY_DESTINATION);

/// A device, or `None` on machines without an adapter.
pub async fn device() -> Option<BoundDevice> {
    match BoundDevice::headless(DeviceOptions::default()).await {
        Ok(device) => Some(device),
        Err(e) => {
            println!("skipping: no device available ({e})");
            None
        }
    }
}

/// A zero-filled buffer of `len` bytes.
pub async fn zeroed(
    device: &BoundDevice,
    label: &str,
    len: usize,
    capabilities: CapabilityFlags,
) -> BufferResource {
    BufferResource::new(device, label, Some(&vec![0u8; len]), capabilities)
        .await
        .expect("can't create buffer")
}

pub fn assert_close(actual: &[f32], expected: &[f32]) {
    assert_eq!(actual.len(), expected.len(), "{actual:?} vs {expected:?}");
    for (a, e) in actual.iter().zip(expected) {
        assert!((a - e).abs() < 1e-5, "{actual:?} vs {expected:?}");
    }
}

/// `out = a + b + c + d`, elementwise, over five storage bindings.
pub const SUM_OF_FOUR: &str = r#"
@group(0) @binding(0) var<storage, read> a: array<f32>;
@group(0) @binding(1) var<storage, read> b: array<f32>;
@group(0) @binding(2) var<storage, read> c: array<f32>;
@group(0) @binding(3) var<storage, read> d: array<f32>;
@group(0) @binding(4) var<storage, read_write> out: array<f32>;

@compute @workgroup_size(64)
fn sum_of_four(@builtin(global_invocation_id) id: vec3<u32>) {
    if (id.x < arrayLength(&out)) {
        out[id.x] = a[id.x] + b[id.x] + c[id.x] + d[id.x];
    }
}
"#;

/// Writes the number of 32-bit words the kernel sees in `input` to `output[0]`.
pub const WORD_COUNT: &str = r#"
@group(0) @binding(0) var<storage, read> input: array<u32>;
@group(0) @binding(1) var<storage, read_write> output: array<u32>;

@compute @workgroup_size(1)
fn count_words() {
    output[0] = arrayLength(&input);
}
"#;
