// rust/worker-core/src/metrics.rs

//! Local resource usage sampling.
//!
//! Registration takes one sample per call and forwards it to channels that
//! can carry it. A failing sample never blocks registration.

use std::sync::Mutex;

use sysinfo::{System, MINIMUM_CPU_UPDATE_INTERVAL};

use crate::error::{Result, WorkerError};

/// CPU and memory utilization as fractions in `[0, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResourceUsage {
    pub cpu: f64,
    pub memory: f64,
}

impl ResourceUsage {
    /// Creates a sample, clamping both values into `[0, 1]`.
    pub fn new(cpu: f64, memory: f64) -> Self {
        Self {
            cpu: clamp_fraction(cpu),
            memory: clamp_fraction(memory),
        }
    }
}

fn clamp_fraction(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Source of resource usage samples.
pub trait MetricsSource: Send + Sync {
    fn sample(&self) -> Result<ResourceUsage>;
}

/// Samples the host through sysinfo.
///
/// CPU usage is computed between consecutive refreshes, so a sample taken
/// right after [`new`](Self::new) reads as zero. Use [`primed`](Self::primed)
/// when the first sample matters.
pub struct SystemMetrics {
    system: Mutex<System>,
}

impl SystemMetrics {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu();
        system.refresh_memory();
        Self {
            system: Mutex::new(system),
        }
    }

    /// Like [`new`](Self::new), then waits out sysinfo's minimum CPU
    /// refresh interval so the first sample reports real CPU usage.
    pub async fn primed() -> Self {
        let metrics = Self::new();
        tokio::time::sleep(MINIMUM_CPU_UPDATE_INTERVAL).await;
        metrics
    }
}

impl Default for SystemMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsSource for SystemMetrics {
    fn sample(&self) -> Result<ResourceUsage> {
        let mut system = self
            .system
            .lock()
            .map_err(|_| WorkerError::metrics("system metrics lock poisoned"))?;

        system.refresh_cpu();
        system.refresh_memory();

        let total = system.total_memory();
        if total == 0 {
            return Err(WorkerError::metrics("total memory reported as zero"));
        }

        let cpu = f64::from(system.global_cpu_info().cpu_usage()) / 100.0;
        let memory = system.used_memory() as f64 / total as f64;
        Ok(ResourceUsage::new(cpu, memory))
    }
}

/// Always returns the same sample.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticMetrics(pub ResourceUsage);

impl MetricsSource for StaticMetrics {
    fn sample(&self) -> Result<ResourceUsage> {
        Ok(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_usage_clamps() {
        let usage = ResourceUsage::new(1.7, -0.2);
        assert_eq!(usage.cpu, 1.0);
        assert_eq!(usage.memory, 0.0);

        let usage = ResourceUsage::new(f64::NAN, 0.5);
        assert_eq!(usage.cpu, 0.0);
        assert_eq!(usage.memory, 0.5);
    }

    #[test]
    fn test_static_metrics() {
        let source = StaticMetrics(ResourceUsage::new(0.25, 0.5));
        let usage = source.sample().unwrap();
        assert_eq!(usage, ResourceUsage::new(0.25, 0.5));
    }

    #[tokio::test]
    async fn test_primed_waits_for_cpu_interval() {
        let started = std::time::Instant::now();
        let source = SystemMetrics::primed().await;
        assert!(started.elapsed() >= MINIMUM_CPU_UPDATE_INTERVAL);
        if let Ok(usage) = source.sample() {
            assert!((0.0..=1.0).contains(&usage.cpu));
        }
    }

    #[test]
    fn test_system_metrics_in_range() {
        let source = SystemMetrics::new();
        // Some sandboxes hide /proc; only check the range when a sample exists.
        if let Ok(usage) = source.sample() {
            assert!((0.0..=1.0).contains(&usage.cpu));
            assert!((0.0..=1.0).contains(&usage.memory));
        }
    }
}
