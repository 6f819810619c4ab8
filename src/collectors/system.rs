/// Local host sampler
use sysinfo::System;

use crate::webserver::ws::message::{LoadAverage, SystemMetrics};

const MB: u64 = 1024 * 1024;

/// Samples CPU, memory, load and uptime
///
/// CPU usage is measured between two refreshes, so the first sample
/// after construction reports 0%.
pub struct HostSampler {
    system: System,
}

impl HostSampler {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu();
        system.refresh_memory();
        Self { system }
    }

    pub fn sample(&mut self) -> SystemMetrics {
        self.system.refresh_cpu();
        self.system.refresh_memory();

        let total = self.system.total_memory();
        let used = self.system.used_memory();
        let memory_percent = if total > 0 {
            (used as f64 / total as f64 * 100.0) as f32
        } else {
            0.0
        };
        let load = System::load_average();

        SystemMetrics {
            cpu_percent: self.system.global_cpu_info().cpu_usage(),
            cpu_count: self.system.cpus().len(),
            memory_used_mb: used / MB,
            memory_total_mb: total / MB,
            memory_percent,
            swap_used_mb: self.system.used_swap() / MB,
            load_average: LoadAverage {
                one: load.one,
                five: load.five,
                fifteen: load.fifteen,
            },
            uptime_secs: System::uptime(),
        }
    }
}

impl Default for HostSampler {
    fn default() -> Self {
        Self::new()
    }
}
