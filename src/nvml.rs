use nvml_wrapper::enum_wrappers::device::{Clock, TemperatureSensor};
use nvml_wrapper::Nvml;

use crate::error::{MonitorError, Result};
use crate::models::DeviceSnapshot;
use crate::source::MetricsSource;

/// Metrics read in-process through the NVIDIA Management Library
pub struct NvmlSource {
    nvml: Option<Nvml>,
}

impl NvmlSource {
    /// Loads and initialises NVML. Fails when the driver library is missing.
    pub fn init() -> Result<Self> {
        let nvml = Nvml::init().map_err(|e| MonitorError::source_unavailable(e.to_string()))?;
        Ok(Self { nvml: Some(nvml) })
    }

    fn nvml(&self) -> Option<&Nvml> {
        self.nvml.as_ref()
    }
}

impl MetricsSource for NvmlSource {
    fn label(&self) -> &'static str {
        "NVML"
    }

    fn count(&self) -> Result<u32> {
        let nvml = self
            .nvml()
            .ok_or_else(|| MonitorError::source_unavailable("NVML already shut down"))?;
        nvml.device_count()
            .map_err(|e| MonitorError::source_unavailable(e.to_string()))
    }

    fn name(&self, index: u32) -> Result<String> {
        let nvml = self
            .nvml()
            .ok_or_else(|| MonitorError::sample_failed(index, "NVML already shut down"))?;
        nvml.device_by_index(index)
            .and_then(|device| device.name())
            .map_err(|e| MonitorError::sample_failed(index, e.to_string()))
    }

    fn sample(&self, index: u32) -> Result<DeviceSnapshot> {
        let nvml = self
            .nvml()
            .ok_or_else(|| MonitorError::sample_failed(index, "NVML already shut down"))?;
        let device = nvml
            .device_by_index(index)
            .map_err(|e| MonitorError::sample_failed(index, e.to_string()))?;

        // Power and temperature are not exposed on every board
        let power_watts = device
            .power_usage()
            .map(|mw| mw as f64 / 1000.0)
            .unwrap_or(0.0);
        let temperature_celsius = device
            .temperature(TemperatureSensor::Gpu)
            .map(f64::from)
            .unwrap_or(0.0);

        let sm_clock_mhz = device
            .clock_info(Clock::SM)
            .map_err(|e| MonitorError::sample_failed(index, e.to_string()))?;
        let utilization_percent = device
            .utilization_rates()
            .map_err(|e| MonitorError::sample_failed(index, e.to_string()))?
            .gpu;

        let reason_mask = match device.current_throttle_reasons() {
            Ok(reasons) => reasons.bits(),
            Err(e) => {
                log::debug!("GPU {}: throttle reasons unavailable: {}", index, e);
                0
            }
        };

        Ok(DeviceSnapshot {
            power_watts,
            sm_clock_mhz,
            utilization_percent,
            reason_mask,
            temperature_celsius,
        })
    }

    fn close(&mut self) {
        if let Some(nvml) = self.nvml.take() {
            if let Err(e) = nvml.shutdown() {
                log::debug!("NVML shutdown failed: {}", e);
            }
        }
    }
}
