use std::panic::{catch_unwind, AssertUnwindSafe};
use sysinfo::{CpuExt, System, SystemExt};
use tracing::error;

use crate::snapshot::{Detected, HardwareInfo};

/// Raw hardware queries behind the probe. The production implementation is
/// backed by `sysinfo`; tests substitute failing or fixed lookups.
pub trait HardwareSource {
    fn cpu_count(&mut self) -> Option<usize>;
    fn cpu_frequency_mhz(&mut self) -> Option<u64>;
    fn total_memory_bytes(&mut self) -> Option<u64>;
}

pub struct SysinfoSource {
    system: System,
}

impl SysinfoSource {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }
}

impl Default for SysinfoSource {
    fn default() -> Self {
        Self::new()
    }
}

impl HardwareSource for SysinfoSource {
    fn cpu_count(&mut self) -> Option<usize> {
        self.system.refresh_cpu();
        let count = self.system.cpus().len();
        (count > 0).then_some(count)
    }

    fn cpu_frequency_mhz(&mut self) -> Option<u64> {
        self.system.refresh_cpu();
        let max = self
            .system
            .cpus()
            .iter()
            .map(|cpu| cpu.frequency())
            .max()
            .unwrap_or(0);
        (max > 0).then_some(max)
    }

    fn total_memory_bytes(&mut self) -> Option<u64> {
        self.system.refresh_memory();
        let total = self.system.total_memory();
        (total > 0).then_some(total)
    }
}

/// Each lookup degrades independently: a panicking or empty query leaves
/// only its own field at `Unknown` and never blocks the other two.
pub(crate) fn probe_hardware(source: &mut dyn HardwareSource) -> HardwareInfo {
    HardwareInfo {
        cores: guarded(source, "cores", |s| s.cpu_count()),
        freq: guarded(source, "freq", |s| s.cpu_frequency_mhz()),
        ram: guarded(source, "ram", |s| s.total_memory_bytes()),
    }
}

fn guarded<T>(
    source: &mut dyn HardwareSource,
    field: &'static str,
    lookup: impl FnOnce(&mut dyn HardwareSource) -> Option<T>,
) -> Detected<T> {
    match catch_unwind(AssertUnwindSafe(|| lookup(source))) {
        Ok(value) => value.into(),
        Err(_) => {
            error!(field, "error while detecting hardware environment");
            Detected::Unknown
        }
    }
}
