//! CPAL-based device lookup
//!
//! Provides a cross-platform interface to audio devices using the CPAL library.

use cpal::traits::{DeviceTrait, HostTrait};
use tonestack_core::domain::audio::{
    AudioEnumerator, AudioError, DeviceId, DeviceInfo, DeviceType, Result, SampleRate,
};
use tracing::{debug, info};

/// Device name as reported by the host
pub fn device_name(device: &cpal::Device) -> String {
    #[allow(deprecated)]
    device
        .name()
        .unwrap_or_else(|_| "Unknown Device".to_string())
}

fn describe(device: &cpal::Device, device_type: DeviceType) -> DeviceInfo {
    let name = device_name(device);

    let default_config = match device_type {
        DeviceType::Output => device.default_output_config(),
        _ => device
            .default_input_config()
            .or_else(|_| device.default_output_config()),
    };
    let default_sample_rate = default_config
        .ok()
        .map(|config| SampleRate::from_hz(config.sample_rate()));

    DeviceInfo {
        id: DeviceId::new(name.clone()),
        name,
        device_type,
        default_sample_rate,
    }
}

/// CPAL-based audio enumerator
pub struct CpalEnumerator {
    host: cpal::Host,
}

impl Default for CpalEnumerator {
    fn default() -> Self {
        Self::new()
    }
}

impl CpalEnumerator {
    pub fn new() -> Self {
        let host = cpal::default_host();
        debug!("Using audio host: {:?}", host.id());
        Self { host }
    }

    fn device_type(device: &cpal::Device) -> Option<DeviceType> {
        let has_input = device
            .supported_input_configs()
            .map(|mut c| c.next().is_some())
            .unwrap_or(false);
        let has_output = device
            .supported_output_configs()
            .map(|mut c| c.next().is_some())
            .unwrap_or(false);

        match (has_input, has_output) {
            (true, true) => Some(DeviceType::Duplex),
            (true, false) => Some(DeviceType::Input),
            (false, true) => Some(DeviceType::Output),
            (false, false) => None,
        }
    }

    /// Capture device by name, or the host default when `name` is `None`
    pub fn input_device(&self, name: Option<&str>) -> Result<cpal::Device> {
        match name {
            None => self
                .host
                .default_input_device()
                .ok_or_else(|| AudioError::DeviceNotFound("No default input device".to_string())),
            Some(name) => self
                .host
                .input_devices()
                .map_err(|e| AudioError::OsError(e.to_string()))?
                .find(|d| device_name(d) == name)
                .ok_or_else(|| AudioError::DeviceNotFound(name.to_string())),
        }
    }

    /// Playback device by name, or the host default when `name` is `None`
    pub fn output_device(&self, name: Option<&str>) -> Result<cpal::Device> {
        match name {
            None => self
                .host
                .default_output_device()
                .ok_or_else(|| AudioError::DeviceNotFound("No default output device".to_string())),
            Some(name) => self
                .host
                .output_devices()
                .map_err(|e| AudioError::OsError(e.to_string()))?
                .find(|d| device_name(d) == name)
                .ok_or_else(|| AudioError::DeviceNotFound(name.to_string())),
        }
    }
}

impl AudioEnumerator for CpalEnumerator {
    fn devices(&self) -> Result<Vec<DeviceInfo>> {
        let devices: Vec<DeviceInfo> = self
            .host
            .devices()
            .map_err(|e| AudioError::OsError(e.to_string()))?
            .filter_map(|device| {
                let device_type = Self::device_type(&device)?;
                let info = describe(&device, device_type);
                debug!("Found device: {}", info.name);
                Some(info)
            })
            .collect();

        info!("Found {} audio devices", devices.len());
        Ok(devices)
    }

    fn default_input_device(&self) -> Result<DeviceInfo> {
        self.input_device(None)
            .map(|device| describe(&device, DeviceType::Input))
    }

    fn default_output_device(&self) -> Result<DeviceInfo> {
        self.output_device(None)
            .map(|device| describe(&device, DeviceType::Output))
    }
}
