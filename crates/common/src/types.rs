//! Common types for the upscaler
//!
//! This module defines the device and precision types shared between the
//! hardware profiler, the inference engine and the HTTP layer.

use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};

/// Largest supported upscaling factor
pub const MAX_SCALE: u32 = 8;

/// Device an inference backend runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Device {
    /// Host CPU
    Cpu,
    /// CUDA device with the given ordinal
    Cuda(u32),
}

impl Device {
    /// Returns true if this is an accelerated device
    pub fn is_accelerated(&self) -> bool {
        !matches!(self, Device::Cpu)
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda(0) => write!(f, "cuda"),
            Device::Cuda(ordinal) => write!(f, "cuda:{}", ordinal),
        }
    }
}

impl FromStr for Device {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cpu" => Ok(Device::Cpu),
            "cuda" | "gpu" => Ok(Device::Cuda(0)),
            other => match other.strip_prefix("cuda:") {
                Some(ordinal) => ordinal
                    .parse()
                    .map(Device::Cuda)
                    .map_err(|_| format!("Invalid CUDA ordinal: {}", s)),
                None => Err(format!("Unknown device: {}", s)),
            },
        }
    }
}

/// Numeric precision used for inference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Precision {
    /// 32-bit floats
    Full,
    /// 16-bit floats
    Half,
}

impl Precision {
    /// Resolves the requested precision against the device.
    ///
    /// Half precision is a device-specific optimization; on a host CPU it
    /// is always turned off.
    pub fn resolve(half_requested: bool, device: Device) -> Self {
        if half_requested && device.is_accelerated() {
            Precision::Half
        } else {
            Precision::Full
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Precision::Full => write!(f, "fp32"),
            Precision::Half => write!(f, "fp16"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_half_precision_disabled_on_cpu() {
        assert_eq!(Precision::resolve(true, Device::Cpu), Precision::Full);
        assert_eq!(Precision::resolve(true, Device::Cuda(0)), Precision::Half);
        assert_eq!(Precision::resolve(false, Device::Cuda(0)), Precision::Full);
    }

    #[test]
    fn test_device_round_trip_through_display() {
        for device in [Device::Cpu, Device::Cuda(0), Device::Cuda(3)] {
            assert_eq!(device.to_string().parse::<Device>().unwrap(), device);
        }
        assert!("tpu".parse::<Device>().is_err());
    }
}
