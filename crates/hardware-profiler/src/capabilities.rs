//! Host summary

use std::fmt;
use sysinfo::{CpuExt, System, SystemExt};

use common::utils::format_bytes;

/// Snapshot of the host the service runs on
#[derive(Debug, Clone)]
pub struct HostSummary {
    /// CPU brand string
    pub cpu_model: String,

    /// Number of physical cores
    pub physical_cores: usize,

    /// Number of logical cores
    pub logical_cores: usize,

    /// Total memory in bytes
    pub total_memory_bytes: u64,

    /// Available memory in bytes
    pub available_memory_bytes: u64,
}

impl HostSummary {
    /// Collects the current host summary
    pub fn collect() -> Self {
        let mut system = System::new();
        system.refresh_cpu();
        system.refresh_memory();

        let cpu_model = system
            .cpus()
            .first()
            .map(|cpu| cpu.brand().trim().to_string())
            .filter(|brand| !brand.is_empty())
            .unwrap_or_else(|| "unknown".to_string());

        Self {
            cpu_model,
            physical_cores: num_cpus::get_physical(),
            logical_cores: num_cpus::get(),
            total_memory_bytes: system.total_memory(),
            available_memory_bytes: system.available_memory(),
        }
    }
}

impl fmt::Display for HostSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} physical / {} logical cores), {} of {} memory available",
            self.cpu_model,
            self.physical_cores,
            self.logical_cores,
            format_bytes(self.available_memory_bytes),
            format_bytes(self.total_memory_bytes),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_reports_cores() {
        let summary = HostSummary::collect();
        assert!(summary.logical_cores >= 1);
        assert!(summary.to_string().contains("cores"));
    }
}
