// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use super::BoundDevice;
use super::error::classify;
use std::borrow::Cow;

#[derive(Debug, Clone)]
pub struct ShaderModule {
    pub(super) module: wgpu::ShaderModule,
}

impl ShaderModule {
    pub async fn compile(
        device: &BoundDevice,
        label: &str,
        source: &str,
    ) -> Result<Self, crate::Error> {
        device.check_lost()?;
        let (module, error) = device
            .scoped(|d| {
                d.create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(label),
                    source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(source)),
                })
            })
            .await;
        if let Some(e) = error {
            return Err(classify(e, crate::Error::Compile));
        }
        //warnings don't fail the compile, but they are worth seeing
        let info = module.get_compilation_info().await;
        for message in info.messages {
            if message.message_type != wgpu::CompilationMessageType::Error {
                logwise::warn_sync!(
                    "{label}: {message}",
                    label = label,
                    message = message.message
                );
            }
        }
        Ok(ShaderModule { module })
    }
}
