//! Device selection.
use crate::result::Result;
use candle_core::Device;
use tracing::{info, warn};

/// Selects the device to train on.
///
/// Uses CUDA device 0 when `accelerate` is true and it is available, otherwise the host.
pub fn select(accelerate: bool) -> Result<Device> {
    let device = if accelerate {
        let device = Device::cuda_if_available(0)?;
        if !device.is_cuda() {
            warn!("CUDA is not available, falling back to the host");
        }
        device
    } else {
        Device::Cpu
    };
    info!("Device: {}", name(&device));
    Ok(device)
}

/// A short name for `device`.
pub fn name(device: &Device) -> &'static str {
    if device.is_cuda() {
        "cuda"
    } else if device.is_metal() {
        "metal"
    } else {
        "cpu"
    }
}
