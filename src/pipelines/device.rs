// SYNOID Forge Compute Device
// Copyright (c) 2026 Xing_The_Creator | SYNOID

use candle_core::{DType, Device};
use std::sync::OnceLock;
use tracing::{info, warn};

static DEVICE: OnceLock<Device> = OnceLock::new();

/// Pick the inference device once per process. CUDA when the build and the
/// machine support it, CPU otherwise (or when forced).
pub fn compute_device(force_cpu: bool) -> &'static Device {
    DEVICE.get_or_init(|| {
        if force_cpu {
            info!("[DEVICE] CPU forced by configuration");
            return Device::Cpu;
        }
        if candle_core::utils::cuda_is_available() {
            match Device::new_cuda(0) {
                Ok(dev) => {
                    info!("[DEVICE] ✓ CUDA device 0 selected");
                    return dev;
                }
                Err(e) => warn!("[DEVICE] CUDA reported but unusable: {}", e),
            }
        }
        warn!("[DEVICE] No GPU available. Diffusion will run on CPU (slow).");
        Device::Cpu
    })
}

/// Half precision only pays off on GPU; CPU kernels want F32.
pub fn preferred_dtype(device: &Device) -> DType {
    if device.is_cuda() {
        DType::F16
    } else {
        DType::F32
    }
}

pub fn describe(device: &Device) -> &'static str {
    if device.is_cuda() {
        "cuda"
    } else if device.is_metal() {
        "metal"
    } else {
        "cpu"
    }
}
