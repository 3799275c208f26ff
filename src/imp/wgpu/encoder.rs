// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use super::error::classify;
use super::signal::signal;
use super::{BoundDevice, Buffer, Pipeline};

/// Resolves when the device has finished everything submitted up to and including
/// the submission that produced it.
#[derive(Debug)]
pub struct Completion {
    done: r#continue::Future<Option<()>>,
}

impl Completion {
    pub async fn wait(self, device: &BoundDevice) -> Result<(), crate::Error> {
        let signalled = self.done.await;
        device.check_lost()?;
        match signalled {
            Some(()) => Ok(()),
            None => Err(crate::Error::DeviceLost(
                "completion callback was discarded by the device".to_string(),
            )),
        }
    }
}

/// Encodes one compute pass plus the result copy and submits it.
///
/// `bindings` are `(slot, buffer)` pairs for bind group 0, already validated against the
/// pipeline's layout.  Device work is not awaited.
#[allow(clippy::too_many_arguments)]
pub async fn submit(
    device: &BoundDevice,
    label: &str,
    pipeline: &Pipeline,
    bindings: &[(u32, &Buffer)],
    workgroups: u32,
    result: &Buffer,
    staging: &Buffer,
    copy_len: u64,
) -> Result<Completion, crate::Error> {
    device.check_lost()?;
    let (bind_group, error) = device
        .scoped(|d| {
            let entries = bindings
                .iter()
                .map(|(slot, buffer)| wgpu::BindGroupEntry {
                    binding: *slot,
                    //the rounded allocation, padding included
                    resource: buffer.buffer.as_entire_binding(),
                })
                .collect::<Vec<_>>();
            d.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout: &pipeline.bind_group_layout,
                entries: &entries,
            })
        })
        .await;
    if let Some(e) = error {
        return Err(classify(e, crate::Error::BindingMismatch));
    }

    let ((), error) = device
        .scoped(|d| {
            let mut encoder =
                d.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) });
            {
                let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some(label),
                    timestamp_writes: None,
                });
                pass.set_pipeline(&pipeline.pipeline);
                pass.set_bind_group(0, &bind_group, &[]);
                pass.dispatch_workgroups(workgroups, 1, 1);
            }
            encoder.copy_buffer_to_buffer(&result.buffer, 0, &staging.buffer, 0, copy_len);
            device.queue().submit(std::iter::once(encoder.finish()));
        })
        .await;
    if let Some(e) = error {
        return Err(classify(e, crate::Error::Configuration));
    }

    let (sender, done) = signal();
    device.queue().on_submitted_work_done(move || sender.send(()));
    device.set_needs_poll();
    Ok(Completion { done })
}
