// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use super::error::classify;
use super::{BoundDevice, ShaderModule};
use crate::bindings::bind_style::{AccessMode, BindingLayoutSignature};

fn layout_entry(slot: u32, access: AccessMode) -> wgpu::BindGroupLayoutEntry {
    let ty = match access {
        AccessMode::ReadOnlyStorage => wgpu::BufferBindingType::Storage { read_only: true },
        AccessMode::ReadWriteStorage => wgpu::BufferBindingType::Storage { read_only: false },
        AccessMode::Uniform => wgpu::BufferBindingType::Uniform,
    };
    wgpu::BindGroupLayoutEntry {
        binding: slot,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    pub(super) pipeline: wgpu::ComputePipeline,
    pub(super) bind_group_layout: wgpu::BindGroupLayout,
}

impl Pipeline {
    /// Builds an explicit layout for `signature` and compiles `entry_point` against it.
    ///
    /// A kernel whose declared interface disagrees with the signature is rejected here.
    pub async fn new(
        device: &BoundDevice,
        label: &str,
        module: &ShaderModule,
        entry_point: &str,
        signature: &BindingLayoutSignature,
    ) -> Result<Self, crate::Error> {
        device.check_lost()?;
        let entries = signature
            .entries()
            .iter()
            .map(|(slot, access)| layout_entry(slot.index(), *access))
            .collect::<Vec<_>>();
        let (pipeline, error) = device
            .scoped(|d| {
                let bind_group_layout = d.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some(label),
                    entries: &entries,
                });
                let layout = d.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                    label: Some(label),
                    bind_group_layouts: &[&bind_group_layout],
                    push_constant_ranges: &[],
                });
                let pipeline = d.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                    label: Some(label),
                    layout: Some(&layout),
                    module: &module.module,
                    entry_point: Some(entry_point),
                    compilation_options: Default::default(),
                    cache: None,
                });
                Pipeline {
                    pipeline,
                    bind_group_layout,
                }
            })
            .await;
        match error {
            Some(e) => Err(classify(e, crate::Error::Compile)),
            None => Ok(pipeline),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::layout_entry;
    use crate::bindings::bind_style::AccessMode;

    #[test]
    fn access_modes_become_buffer_bindings() {
        let entry = layout_entry(3, AccessMode::ReadOnlyStorage);
        assert_eq!(entry.binding, 3);
        assert_eq!(entry.visibility, wgpu::ShaderStages::COMPUTE);
        assert!(matches!(
            entry.ty,
            wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: true },
                ..
            }
        ));
        assert!(matches!(
            layout_entry(0, AccessMode::Uniform).ty,
            wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                ..
            }
        ));
    }
}
