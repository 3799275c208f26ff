// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use crate::compute::device::{DeviceOptions, PowerPreference};

#[derive(Debug)]
pub struct UnboundDevice {
    pub(super) adapter: wgpu::Adapter,
}

impl UnboundDevice {
    pub async fn pick(
        entry_point: &crate::entry_point::EntryPoint,
        device_options: &DeviceOptions,
    ) -> Result<UnboundDevice, super::Error> {
        let power_preference = match device_options.power_preference {
            PowerPreference::None => wgpu::PowerPreference::None,
            PowerPreference::LowPower => wgpu::PowerPreference::LowPower,
            PowerPreference::HighPerformance => wgpu::PowerPreference::HighPerformance,
        };
        //headless: compute never presents
        let options = wgpu::RequestAdapterOptions {
            power_preference,
            force_fallback_adapter: false,
            compatible_surface: None,
        };
        let adapter = match entry_point.0.instance.request_adapter(&options).await {
            Ok(adapter) => adapter,
            Err(e) if device_options.allow_fallback_adapter => {
                logwise::warn_sync!(
                    "No hardware adapter ({err}), trying a fallback adapter",
                    err = logwise::privacy::LogIt(&e)
                );
                let fallback = wgpu::RequestAdapterOptions {
                    force_fallback_adapter: true,
                    ..options
                };
                entry_point.0.instance.request_adapter(&fallback).await?
            }
            Err(e) => return Err(e.into()),
        };
        logwise::info_sync!(
            "Picked adapter {info}",
            info = logwise::privacy::LogIt(&adapter.get_info())
        );
        Ok(UnboundDevice { adapter })
    }
}
