// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! End-to-end dispatches against a real device.
//!
//! Each test skips itself when the machine has no adapter.

mod common;

use common::{
    ADD, IDENTITY, INPUT, OUTPUT, STAGING, SUM, SUM_OF_FOUR, assert_close, device, zeroed,
};
use kernel_dispatch::Error;
use kernel_dispatch::bindings::bind_style::{AccessMode, BindSlot, BindingDescriptor};
use kernel_dispatch::bindings::buffer::BufferResource;
use kernel_dispatch::bindings::map_state::MapState;
use kernel_dispatch::compute::dispatch::{
    DispatchExecutor, DispatchRequest, DispatchState, Workgroups,
};
use kernel_dispatch::compute::element::f16;

#[test]
fn identity_round_trip() {
    test_executors::sleep_on(async {
        let Some(device) = device().await else { return };
        let input = zeroed(&device, "input", 20, INPUT).await;
        input
            .write(
                &[1.0f32, 2.0, 3.0, 4.0, 5.0]
                    .iter()
                    .flat_map(|f| f.to_ne_bytes())
                    .collect::<Vec<_>>(),
                0,
            )
            .await
            .expect("write failed");
        let output = zeroed(&device, "output", 20, OUTPUT).await;
        let staging = zeroed(&device, "staging", 20, STAGING).await;

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
            ))
            .workgroups(Workgroups::ForElements { count: 5, width: 64 });
        let values = executor.dispatch_f32(request).await.expect("dispatch failed");
        assert_close(&values, &[1.0, 2.0, 3.0, 4.0, 5.0]);

        assert_eq!(executor.last_state(), DispatchState::Idle);
        //released on the way out
        assert_eq!(staging.map_state(), MapState::Unmapped);
    });
}

#[test]
fn reduction_sums_to_fifteen() {
    test_executors::sleep_on(async {
        let Some(device) = device().await else { return };
        let input =
            BufferResource::with_elements(&device, "input", &[1.0f32, 2.0, 3.0, 4.0, 5.0], INPUT)
                .await
                .expect("can't create input");
        let output = zeroed(&device, "total", 4, OUTPUT).await;
        let staging = zeroed(&device, "staging", 4, STAGING).await;

        let mut executor = DispatchExecutor::new(&device, "sum", SUM)
            .await
            .expect("can't compile");
        let request = DispatchRequest::new("sum", &output, &staging)
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
        let values = executor.dispatch_f32(request).await.expect("dispatch failed");
        assert_close(&values, &[15.0]);
    });
}

#[test]
fn elementwise_add_of_sixteen() {
    test_executors::sleep_on(async {
        let Some(device) = device().await else { return };
        let a = BufferResource::with_elements(&device, "a", &[1.0f32; 16], INPUT)
            .await
            .expect("can't create a");
        let b = BufferResource::with_elements(&device, "b", &[2.0f32; 16], INPUT)
            .await
            .expect("can't create b");
        let out = zeroed(&device, "out", 64, OUTPUT).await;
        let staging = zeroed(&device, "staging", 64, STAGING).await;

        let workgroups = Workgroups::ForElements {
            count: 16,
            width: 64,
        };
        assert_eq!(workgroups.resolve().unwrap(), 1);

        let mut executor = DispatchExecutor::new(&device, "add", ADD)
            .await
            .expect("can't compile");
        //bindings may be given in any order
        let request = DispatchRequest::new("add", &out, &staging)
            .bind_all([
                BindingDescriptor::derive(&out, BindSlot::new(2), AccessMode::ReadWriteStorage),
                BindingDescriptor::derive(&a, BindSlot::new(0), AccessMode::ReadOnlyStorage),
                BindingDescriptor::derive(&b, BindSlot::new(1), AccessMode::ReadOnlyStorage),
            ])
            .workgroups(workgroups);
        let values = executor.dispatch_f32(request).await.expect("dispatch failed");
        assert_close(&values, &[3.0; 16]);
    });
}

#[test]
fn smaller_staging_truncates() {
    test_executors::sleep_on(async {
        let Some(device) = device().await else { return };
        let input =
            BufferResource::with_elements(&device, "input", &[1.0f32, 2.0, 3.0, 4.0, 5.0], INPUT)
                .await
                .expect("can't create input");
        let output = zeroed(&device, "output", 20, OUTPUT).await;
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
        let values = executor.dispatch_f32(request).await.expect("dispatch failed");
        assert_close(&values, &[1.0, 2.0]);
    });
}

#[test]
fn partial_element_is_dropped() {
    test_executors::sleep_on(async {
        let Some(device) = device().await else { return };
        //bit patterns of normal floats, so the f32 copy can't flush them
        let words = [1.0f32, 2.0, 3.0].map(f32::to_bits);
        let input = BufferResource::with_elements(&device, "input", &words, INPUT)
            .await
            .expect("can't create input");
        let output = zeroed(&device, "output", 12, OUTPUT).await;
        //10 bytes hold two whole u32s
        let staging = zeroed(&device, "staging", 10, STAGING).await;

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
        //the kernel copies words without interpreting them
        let values = executor
            .dispatch::<u32>(request)
            .await
            .expect("dispatch failed");
        assert_eq!(values, words[..2].to_vec());
    });
}

#[test]
fn half_precision_layout() {
    test_executors::sleep_on(async {
        let Some(device) = device().await else { return };
        let halves = [1.5f32, -2.0, 0.25, 8.0].map(f16::from_f32);
        let input = BufferResource::with_elements(&device, "input", &halves, INPUT)
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
        let values = executor
            .dispatch::<f16>(request)
            .await
            .expect("dispatch failed");
        assert_eq!(values, halves.to_vec());
    });
}

#[test]
fn pipelined_submissions_resolve_in_order() {
    test_executors::sleep_on(async {
        let Some(device) = device().await else { return };
        let input =
            BufferResource::with_elements(&device, "input", &[1.0f32, 2.0, 3.0, 4.0], INPUT)
                .await
                .expect("can't create input");
        let copied = zeroed(&device, "copied", 16, OUTPUT).await;
        let doubled = zeroed(&device, "doubled", 16, OUTPUT).await;
        let staging_a = zeroed(&device, "staging a", 16, STAGING).await;
        let staging_b = zeroed(&device, "staging b", 16, STAGING).await;

        let mut executor = DispatchExecutor::new(&device, "identity", IDENTITY)
            .await
            .expect("can't compile");
        let first = executor
            .submit(
                DispatchRequest::new("main", &copied, &staging_a)
                    .bind(BindingDescriptor::derive(
                        &input,
                        BindSlot::new(0),
                        AccessMode::ReadOnlyStorage,
                    ))
                    .bind(BindingDescriptor::derive(
                        &copied,
                        BindSlot::new(1),
                        AccessMode::ReadWriteStorage,
                    )),
            )
            .await
            .expect("first submit failed");
        let second = executor
            .submit(
                DispatchRequest::new("double", &doubled, &staging_b)
                    .bind(BindingDescriptor::derive(
                        &input,
                        BindSlot::new(0),
                        AccessMode::ReadOnlyStorage,
                    ))
                    .bind(BindingDescriptor::derive(
                        &doubled,
                        BindSlot::new(1),
                        AccessMode::ReadWriteStorage,
                    )),
            )
            .await
            .expect("second submit failed");
        assert_eq!(second.state(), DispatchState::Submitted);

        let (a, b) = futures::future::join(first.resolve::<f32>(), second.resolve::<f32>()).await;
        assert_close(&a.expect("first resolve failed"), &[1.0, 2.0, 3.0, 4.0]);
        assert_close(&b.expect("second resolve failed"), &[2.0, 4.0, 6.0, 8.0]);
    });
}

#[test]
fn shared_staging_buffer_is_refused_while_mapped() {
    test_executors::sleep_on(async {
        let Some(device) = device().await else { return };
        let input = BufferResource::with_elements(&device, "input", &[1.0f32], INPUT)
            .await
            .expect("can't create input");
        let output = zeroed(&device, "output", 4, OUTPUT).await;
        let staging = zeroed(&device, "staging", 4, STAGING).await;

        let mut executor = DispatchExecutor::new(&device, "identity", IDENTITY)
            .await
            .expect("can't compile");
        let (input_ref, output_ref, staging_ref) = (&input, &output, &staging);
        let request = move || {
            DispatchRequest::new("main", output_ref, staging_ref)
                .bind(BindingDescriptor::derive(
                    input_ref,
                    BindSlot::new(0),
                    AccessMode::ReadOnlyStorage,
                ))
                .bind(BindingDescriptor::derive(
                    output_ref,
                    BindSlot::new(1),
                    AccessMode::ReadWriteStorage,
                ))
        };

        executor.dispatch_f32(request()).await.expect("dispatch failed");
        let view = staging.map_read().await.expect("can't map");
        let e = executor.submit(request()).await.unwrap_err();
        assert!(matches!(e, Error::Map(_)), "{e:?}");
        assert!(matches!(executor.last_state(), DispatchState::Failed(_)));
        view.release();

        //the executor is still usable after a failed request
        let values = executor.dispatch_f32(request()).await.expect("dispatch failed");
        assert_close(&values, &[1.0]);
    });
}

#[test]
fn five_storage_bindings() {
    test_executors::sleep_on(async {
        let Some(device) = device().await else { return };
        if device.max_storage_buffers_per_stage() < 5 {
            println!("skipping: adapter binds fewer than 5 storage buffers");
            return;
        }
        let mut inputs = Vec::new();
        for (label, value) in [("a", 1.0f32), ("b", 2.0), ("c", 3.0), ("d", 4.0)] {
            let buffer = BufferResource::with_elements(&device, label, &[value; 8], INPUT)
                .await
                .expect("can't create input");
            inputs.push(buffer);
        }
        let out = zeroed(&device, "out", 32, OUTPUT).await;
        let staging = zeroed(&device, "staging", 32, STAGING).await;

        let mut executor = DispatchExecutor::new(&device, "sum of four", SUM_OF_FOUR)
            .await
            .expect("can't compile");
        let request = DispatchRequest::new("sum_of_four", &out, &staging)
            .bind_all(inputs.iter().enumerate().map(|(slot, buffer)| {
                BindingDescriptor::derive(
                    buffer,
                    BindSlot::new(slot as u32),
                    AccessMode::ReadOnlyStorage,
                )
            }))
            .bind(BindingDescriptor::derive(
                &out,
                BindSlot::new(4),
                AccessMode::ReadWriteStorage,
            ));
        let values = executor.dispatch_f32(request).await.expect("dispatch failed");
        assert_close(&values, &[10.0; 8]);
    });
}

#[test]
fn destroyed_device_is_fatal() {
    test_executors::sleep_on(async {
        let Some(device) = device().await else { return };
        let input = BufferResource::with_elements(&device, "input", &[3.0f32], INPUT)
            .await
            .expect("can't create input");
        let output = zeroed(&device, "output", 4, OUTPUT).await;
        let staging = zeroed(&device, "staging", 4, STAGING).await;

        let mut executor = DispatchExecutor::new(&device, "identity", IDENTITY)
            .await
            .expect("can't compile");
        let (input_ref, output_ref, staging_ref) = (&input, &output, &staging);
        let request = move || {
            DispatchRequest::new("main", output_ref, staging_ref)
                .bind(BindingDescriptor::derive(
                    input_ref,
                    BindSlot::new(0),
                    AccessMode::ReadOnlyStorage,
                ))
                .bind(BindingDescriptor::derive(
                    output_ref,
                    BindSlot::new(1),
                    AccessMode::ReadWriteStorage,
                ))
        };
        let values = executor.dispatch_f32(request()).await.expect("dispatch failed");
        assert_close(&values, &[3.0]);
        assert_eq!(executor.cache().len(), 1);

        device.destroy();
        assert!(device.is_lost());

        let e = executor.submit(request()).await.unwrap_err();
        assert!(matches!(e, Error::DeviceLost(_)), "{e:?}");
        assert!(e.is_fatal());
        //cached pipelines died with the device
        assert!(executor.cache().is_empty());
        //and the executor stays refused
        let e = executor.dispatch_f32(request()).await.unwrap_err();
        assert!(matches!(e, Error::DeviceLost(_)), "{e:?}");

        let e = BufferResource::new(&device, "after", None, INPUT)
            .await
            .unwrap_err();
        assert!(matches!(e, Error::DeviceLost(_)), "{e:?}");
        let e = staging.map_read().await.unwrap_err();
        assert!(matches!(e, Error::DeviceLost(_)), "{e:?}");
        //a refused map leaves nothing pending
        assert_eq!(staging.map_state(), MapState::Unmapped);
    });
}
