// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Futures returned by device operations are Send, so they can move between tasks and
//! thread pools.

mod common;

use common::{IDENTITY, INPUT, OUTPUT, STAGING, device, zeroed};
use kernel_dispatch::bindings::bind_style::{AccessMode, BindSlot, BindingDescriptor};
use kernel_dispatch::bindings::buffer::BufferResource;
use kernel_dispatch::compute::device::BoundDevice;
use kernel_dispatch::compute::dispatch::{DispatchExecutor, DispatchRequest, Submission};

fn assert_send<T: Send>(t: T) -> T {
    t
}

#[allow(dead_code)]
fn futures_are_send(
    device: &BoundDevice,
    buffer: &BufferResource,
    executor: &mut DispatchExecutor,
    submission: Submission<'static>,
) {
    assert_send(BufferResource::new(device, "send", None, INPUT));
    assert_send(BufferResource::zeroed(device, "send", 64, INPUT));
    assert_send(buffer.write(&[0; 4], 0));
    assert_send(buffer.map_read());
    assert_send(submission.resolve::<f32>());
    assert_send(executor.submit(DispatchRequest::new("main", buffer, buffer)));
}

#[test]
fn dispatch_on_another_thread() {
    let handle = std::thread::spawn(|| {
        test_executors::sleep_on(async {
            let Some(device) = device().await else { return None };
            let input = BufferResource::with_elements(&device, "input", &[4.0f32, 5.0], INPUT)
                .await
                .expect("can't create input");
            let output = zeroed(&device, "output", 8, OUTPUT).await;
            let staging = zeroed(&device, "staging", 8, STAGING).await;
            let mut executor = DispatchExecutor::new(&device, "identity", IDENTITY)
                .await
                .expect("can't compile");
            let request = DispatchRequest::new("main", &output, &staging)
                .bind(BindingDescriptor::derive(
                    &input,
                    BindSlot::new(0),
                    AccessMode::ReadOnlyStorage,
                ))
                .bind(BindingDescriptor::derive(
                    &output,
                    BindSlot::new(1),
                    AccessMode::ReadWriteStorage,
                ));
            Some(executor.dispatch_f32(request).await.expect("dispatch failed"))
        })
    });
    if let Some(values) = handle.join().expect("dispatch thread panicked") {
        assert_eq!(values, vec![4.0, 5.0]);
    }
}
