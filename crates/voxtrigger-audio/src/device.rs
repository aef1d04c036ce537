use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Device, Host};
use voxtrigger_core::AudioError;

/// Name that selects the host's default input device.
pub const DEFAULT_DEVICE: &str = "default";

/// Input device lookup on the default cpal host.
pub struct DeviceManager {
    host: Host,
}

impl DeviceManager {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }

    fn named_inputs(&self) -> Result<Vec<(String, Device)>, AudioError> {
        let devices = self
            .host
            .input_devices()
            .map_err(|e| AudioError::DeviceEnumeration(e.to_string()))?;
        Ok(devices
            .map(|device| {
                let name = device.name().unwrap_or_else(|_| "unknown".to_string());
                (name, device)
            })
            .collect())
    }

    /// Names of every input device, in host order.
    pub fn input_device_names(&self) -> Result<Vec<String>, AudioError> {
        Ok(self.named_inputs()?.into_iter().map(|(name, _)| name).collect())
    }

    pub fn default_input_name(&self) -> Option<String> {
        self.host.default_input_device().and_then(|d| d.name().ok())
    }

    /// Resolve a configured device name. [`DEFAULT_DEVICE`] picks the host
    /// default; otherwise an exact match wins over a case-insensitive one.
    pub fn resolve_input(&self, name: &str) -> Result<Device, AudioError> {
        let name = name.trim();
        if name.eq_ignore_ascii_case(DEFAULT_DEVICE) {
            return self
                .host
                .default_input_device()
                .ok_or_else(|| AudioError::DeviceNotFound("no default input device".to_string()));
        }

        let inputs = self.named_inputs()?;
        let names: Vec<&str> = inputs.iter().map(|(n, _)| n.as_str()).collect();
        match pick_device(&names, name) {
            Some(idx) => inputs
                .into_iter()
                .nth(idx)
                .map(|(_, device)| device)
                .ok_or_else(|| AudioError::DeviceNotFound(name.to_string())),
            None => Err(AudioError::DeviceNotFound(format!(
                "input device not found: {name}"
            ))),
        }
    }
}

impl Default for DeviceManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Index of the device called `wanted`: exact first, then ignoring case.
fn pick_device(names: &[&str], wanted: &str) -> Option<usize> {
    names
        .iter()
        .position(|n| *n == wanted)
        .or_else(|| names.iter().position(|n| n.eq_ignore_ascii_case(wanted)))
}
