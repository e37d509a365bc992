use crate::error::Result;
use crate::models::DeviceSnapshot;

/// Anything that can report GPU metrics by device index
pub trait MetricsSource {
    /// Short backend name shown in the header
    fn label(&self) -> &'static str;

    /// Number of visible devices
    fn count(&self) -> Result<u32>;

    fn name(&self, index: u32) -> Result<String>;

    /// Fresh snapshot; `SampleFailed` on a transient read error
    fn sample(&self, index: u32) -> Result<DeviceSnapshot>;

    /// Releases backend resources. Idempotent, never fails.
    fn close(&mut self);
}

/// Picks the first backend that is available: NVML when compiled in and the
/// driver library loads, otherwise `nvidia-smi`.
pub fn open() -> Box<dyn MetricsSource> {
    #[cfg(feature = "nvml")]
    {
        match crate::nvml::NvmlSource::init() {
            Ok(source) => {
                log::info!("using NVML backend");
                return Box::new(source);
            }
            Err(e) => log::info!("NVML unavailable ({}), falling back to nvidia-smi", e),
        }
    }

    log::info!("using nvidia-smi backend");
    Box::new(crate::nvidia::SmiSource::new())
}
