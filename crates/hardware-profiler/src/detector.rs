//! Accelerated device detection

use tracing::{debug, info};

use common::types::Device;

/// Picks the accelerated device if one is usable, else the host CPU
pub fn detect_device() -> Device {
    if is_cuda_available() {
        info!("CUDA device available, using cuda:0");
        Device::Cuda(0)
    } else {
        debug!("No accelerated device available, falling back to cpu");
        Device::Cpu
    }
}

/// Checks if CUDA is available
pub fn is_cuda_available() -> bool {
    #[cfg(feature = "cuda")]
    {
        use ort::execution_providers::{CUDAExecutionProvider, ExecutionProvider};

        match CUDAExecutionProvider::default().is_available() {
            Ok(available) => available,
            Err(e) => {
                tracing::warn!("Failed to query CUDA execution provider: {}", e);
                false
            }
        }
    }

    #[cfg(not(feature = "cuda"))]
    {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_matches_cuda_availability() {
        let device = detect_device();
        assert_eq!(device.is_accelerated(), is_cuda_available());
    }
}
