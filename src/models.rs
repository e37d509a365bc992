/// One observation of one device at one instant
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DeviceSnapshot {
    pub power_watts: f64,
    pub sm_clock_mhz: u32,
    pub utilization_percent: u32,
    /// Vendor clock-event (throttle) reason bits
    pub reason_mask: u64,
    pub temperature_celsius: f64,
}

/// A watched device, resolved once at startup
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub index: u32,
    pub name: String,
}

impl DeviceIdentity {
    pub fn new(index: u32, name: String) -> Self {
        Self { index, name }
    }
}
